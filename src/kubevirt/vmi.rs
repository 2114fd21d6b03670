//! VirtualMachineInstance lookups
//!
//! Read-only access to the VMI status fields the network checks need:
//! phase, node, primary network interface address and migration state.

use anyhow::{Context, Result};
use kube::api::Api;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::k8s::K8sClient;

/// VirtualMachineInstance custom resource specification
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstance",
    plural = "virtualmachineinstances",
    shortname = "vmi",
    namespaced,
    status = "VirtualMachineInstanceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    /// Domain specification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<serde_json::Value>,

    /// Networks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<VmiNetwork>,
}

/// Network attached to a VMI
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiNetwork {
    /// Network name, matches the interface name
    pub name: String,

    /// Present when this is the pod (primary) network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<serde_json::Value>,

    /// Present for secondary networks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multus: Option<serde_json::Value>,
}

/// VMI Status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    /// Current phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Node name where VMI is running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<VmiCondition>,

    /// Interfaces with IP addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<VmiInterface>,

    /// Migration state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_state: Option<MigrationState>,
}

/// VMI Condition
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiCondition {
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

/// VMI network interface
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiInterface {
    /// Interface name (network name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// MAC address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// IP addresses (multiple)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,

    /// Interface name inside guest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
}

/// Migration state
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MigrationState {
    /// Migration completed
    #[serde(default)]
    pub completed: bool,

    /// Migration failed
    #[serde(default)]
    pub failed: bool,

    /// Migration UID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_uid: Option<String>,

    /// Source node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_node: Option<String>,

    /// Target node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_node: Option<String>,

    /// End timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<String>,
}

/// VMI phases
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmiPhase {
    Pending,
    Scheduling,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl VmiPhase {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => VmiPhase::Pending,
            "scheduling" => VmiPhase::Scheduling,
            "scheduled" => VmiPhase::Scheduled,
            "running" => VmiPhase::Running,
            "succeeded" => VmiPhase::Succeeded,
            "failed" => VmiPhase::Failed,
            _ => VmiPhase::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, VmiPhase::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VmiPhase::Succeeded | VmiPhase::Failed)
    }
}

/// The VMI's primary network: the one bound to the pod network
pub fn primary_network(vmi: &VirtualMachineInstance) -> Option<&VmiNetwork> {
    vmi.spec.networks.iter().find(|n| n.pod.is_some())
}

/// First parseable address reported for interface `iface_name`
pub fn interface_ip(vmi: &VirtualMachineInstance, iface_name: &str) -> Option<IpAddr> {
    let status = vmi.status.as_ref()?;
    let iface = status
        .interfaces
        .iter()
        .find(|i| i.name.as_deref() == Some(iface_name))?;

    iface
        .ip_address
        .iter()
        .chain(iface.ip_addresses.iter())
        .find_map(|ip| ip.parse().ok())
}

/// Address of the VMI's primary network interface
pub fn primary_ip(vmi: &VirtualMachineInstance) -> Option<IpAddr> {
    interface_ip(vmi, &primary_network(vmi)?.name)
}

/// VMI Manager for monitoring
pub struct VmiManager {
    client: K8sClient,
}

impl VmiManager {
    /// Create a new VMI manager
    pub fn new(client: K8sClient) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<VirtualMachineInstance> {
        Api::namespaced(self.client.client().clone(), namespace)
    }

    /// Get a VMI
    pub async fn get(&self, name: &str, namespace: &str) -> Result<VirtualMachineInstance> {
        let api = self.api(namespace);
        api.get(name)
            .await
            .with_context(|| format!("Failed to get VirtualMachineInstance {namespace}/{name}"))
    }

    /// Get VMI phase
    pub async fn get_phase(&self, name: &str, namespace: &str) -> Result<VmiPhase> {
        let vmi = self.get(name, namespace).await?;
        let phase = vmi
            .status
            .and_then(|s| s.phase)
            .unwrap_or_else(|| "unknown".to_string());
        Ok(VmiPhase::from_str(&phase))
    }

    /// Check if VMI is running
    pub async fn is_running(&self, name: &str, namespace: &str) -> Result<bool> {
        let phase = self.get_phase(name, namespace).await?;
        Ok(phase.is_running())
    }

    /// Address of the primary network interface
    pub async fn primary_ip(&self, name: &str, namespace: &str) -> Result<IpAddr> {
        let vmi = self.get(name, namespace).await?;
        let network = primary_network(&vmi)
            .with_context(|| format!("VMI {namespace}/{name} has no primary network"))?;

        interface_ip(&vmi, &network.name).with_context(|| {
            format!(
                "VMI {namespace}/{name} reports no address on interface {}",
                network.name
            )
        })
    }

    /// Get node where VMI is running
    pub async fn get_node(&self, name: &str, namespace: &str) -> Result<Option<String>> {
        let vmi = self.get(name, namespace).await?;
        Ok(vmi.status.and_then(|s| s.node_name))
    }

    /// Current migration state, if the VMI was ever migrated
    pub async fn migration_state(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<MigrationState>> {
        let vmi = self.get(name, namespace).await?;
        Ok(vmi.status.and_then(|s| s.migration_state))
    }

    /// Wait for a migration newer than `previous` to complete.
    ///
    /// Returns the completed state, or an error when the migration failed or
    /// `timeout_secs` elapsed.
    pub async fn wait_for_migration(
        &self,
        name: &str,
        namespace: &str,
        previous: Option<&MigrationState>,
        timeout_secs: u64,
        interval: Duration,
    ) -> Result<MigrationState> {
        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(timeout_secs);

        info!(
            "Waiting for VMI {}/{} to migrate (timeout: {}s)",
            namespace, name, timeout_secs
        );

        loop {
            if start.elapsed() > timeout {
                warn!("Timeout waiting for VMI {}/{} to migrate", namespace, name);
                anyhow::bail!("VMI {namespace}/{name} did not migrate within {timeout_secs}s");
            }

            match self.migration_state(name, namespace).await {
                Ok(Some(state)) if is_new_migration(&state, previous) => {
                    if state.failed {
                        anyhow::bail!(
                            "Migration of VMI {namespace}/{name} failed ({:?} -> {:?})",
                            state.source_node,
                            state.target_node
                        );
                    }
                    if state.completed {
                        info!(
                            "VMI {}/{} migrated {:?} -> {:?}",
                            namespace, name, state.source_node, state.target_node
                        );
                        return Ok(state);
                    }
                    debug!("VMI {}/{} migration in progress", namespace, name);
                }
                Ok(_) => debug!("VMI {}/{} has no new migration yet", namespace, name),
                Err(e) => debug!("Error getting VMI migration state: {}", e),
            }

            sleep(interval).await;
        }
    }
}

fn is_new_migration(state: &MigrationState, previous: Option<&MigrationState>) -> bool {
    match previous {
        None => true,
        Some(prev) => prev.migration_uid != state.migration_uid,
    }
}
