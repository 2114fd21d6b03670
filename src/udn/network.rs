//! UserDefinedNetwork resource lookups
//!
//! Read-only access to OVN-Kubernetes UserDefinedNetwork resources: their
//! topology, role, subnets and readiness.

use anyhow::{Context, Result};
use kube::api::Api;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::subnet::Subnet;
use crate::k8s::K8sClient;

/// Condition types that mark a UDN as ready
const READY_CONDITIONS: [&str; 2] = ["NetworkReady", "NetworkCreated"];

/// UserDefinedNetwork custom resource specification
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "k8s.ovn.org",
    version = "v1",
    kind = "UserDefinedNetwork",
    plural = "userdefinednetworks",
    namespaced,
    status = "UserDefinedNetworkStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct UserDefinedNetworkSpec {
    /// Layer2 or Layer3
    pub topology: String,

    /// Layer2 configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer2: Option<Layer2Config>,

    /// Layer3 configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer3: Option<Layer3Config>,
}

/// Layer2 topology configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Layer2Config {
    /// Primary or Secondary
    pub role: String,

    /// Subnets in CIDR notation
    #[serde(default)]
    pub subnets: Vec<String>,

    /// IPAM settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<IpamConfig>,

    /// MTU
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
}

/// Layer3 topology configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Layer3Config {
    /// Primary or Secondary
    pub role: String,

    /// Cluster subnets
    #[serde(default)]
    pub subnets: Vec<Layer3Subnet>,
}

/// Layer3 cluster subnet
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Layer3Subnet {
    /// Subnet in CIDR notation
    pub cidr: String,

    /// Per-node prefix length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_subnet: Option<u8>,
}

/// IPAM settings
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpamConfig {
    /// Persistent keeps VM addresses across restarts and migrations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<String>,
}

/// UDN status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDefinedNetworkStatus {
    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<UdnCondition>,
}

/// UDN condition
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UdnCondition {
    /// Condition type
    #[serde(rename = "type")]
    pub condition_type: String,

    /// Condition status
    pub status: String,

    /// Reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UserDefinedNetwork {
    /// Network role, from whichever topology section is set
    pub fn role(&self) -> Option<&str> {
        self.spec
            .layer2
            .as_ref()
            .map(|l2| l2.role.as_str())
            .or_else(|| self.spec.layer3.as_ref().map(|l3| l3.role.as_str()))
    }

    pub fn is_primary(&self) -> bool {
        self.role()
            .map(|r| r.eq_ignore_ascii_case("primary"))
            .unwrap_or(false)
    }

    /// Declared subnets, parsed
    pub fn subnets(&self) -> Result<Vec<Subnet>> {
        let mut cidrs: Vec<&str> = Vec::new();
        if let Some(l2) = &self.spec.layer2 {
            cidrs.extend(l2.subnets.iter().map(String::as_str));
        }
        if let Some(l3) = &self.spec.layer3 {
            cidrs.extend(l3.subnets.iter().map(|s| s.cidr.as_str()));
        }

        cidrs.into_iter().map(str::parse).collect()
    }

    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| {
                s.conditions.iter().any(|c| {
                    READY_CONDITIONS.contains(&c.condition_type.as_str())
                        && c.status.eq_ignore_ascii_case("true")
                })
            })
            .unwrap_or(false)
    }
}

/// UDN manager for read-only lookups
pub struct UdnManager {
    client: K8sClient,
}

impl UdnManager {
    pub fn new(client: K8sClient) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<UserDefinedNetwork> {
        Api::namespaced(self.client.client().clone(), namespace)
    }

    /// Get a UDN
    pub async fn get(&self, name: &str, namespace: &str) -> Result<UserDefinedNetwork> {
        self.api(namespace)
            .get(name)
            .await
            .with_context(|| format!("Failed to get UserDefinedNetwork {namespace}/{name}"))
    }

    /// Wait for the UDN to report ready
    pub async fn wait_ready(
        &self,
        name: &str,
        namespace: &str,
        timeout_secs: u64,
        interval: Duration,
    ) -> Result<UserDefinedNetwork> {
        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(timeout_secs);

        loop {
            if start.elapsed() > timeout {
                warn!(
                    "Timeout waiting for UserDefinedNetwork {}/{} to be ready",
                    namespace, name
                );
                anyhow::bail!("UserDefinedNetwork {namespace}/{name} not ready after {timeout_secs}s");
            }

            match self.get(name, namespace).await {
                Ok(udn) if udn.is_ready() => {
                    info!("UserDefinedNetwork {}/{} is ready", namespace, name);
                    return Ok(udn);
                }
                Ok(_) => debug!("UserDefinedNetwork {}/{} not ready yet", namespace, name),
                Err(e) => debug!("Error getting UserDefinedNetwork: {}", e),
            }

            sleep(interval).await;
        }
    }
}
