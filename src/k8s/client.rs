//! Kubernetes client wrapper
//!
//! Provides a high-level interface to the Kubernetes API.

use anyhow::{Context, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{api::Api, Client};
use tracing::{info, warn};

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
    namespace: String,
}

impl K8sClient {
    /// Create a new Kubernetes client from the ambient kubeconfig
    pub async fn new(namespace: impl Into<String>) -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;

        Ok(Self {
            client,
            namespace: namespace.into(),
        })
    }

    /// Get the underlying kube client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Check if a CRD named `<plural>.<group>` exists
    pub async fn crd_exists(&self, plural: &str, group: &str) -> Result<bool> {
        let crds: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let crd_name = format!("{plural}.{group}");

        match crds.get(&crd_name).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(e).context("Failed to check CRD existence"),
        }
    }

    /// Verify the KubeVirt and OVN-Kubernetes UDN CRDs are installed
    pub async fn preflight(&self) -> Result<bool> {
        let mut ok = true;

        for (plural, group) in REQUIRED_CRDS {
            if self.crd_exists(plural, group).await? {
                info!("CRD {}.{} is installed", plural, group);
            } else {
                warn!("CRD {}.{} is not installed", plural, group);
                ok = false;
            }
        }

        Ok(ok)
    }
}

/// CRDs the network checks read
pub const REQUIRED_CRDS: [(&str, &str); 2] = [
    ("virtualmachineinstances", "kubevirt.io"),
    ("userdefinednetworks", "k8s.ovn.org"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_crds() {
        let names: Vec<String> = REQUIRED_CRDS
            .iter()
            .map(|(plural, group)| format!("{plural}.{group}"))
            .collect();
        assert!(names.contains(&"userdefinednetworks.k8s.ovn.org".to_string()));
        assert!(names.contains(&"virtualmachineinstances.kubevirt.io".to_string()));
    }
}
