//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use crate::kubevirt::SshConfig;
use crate::traffic::TrafficSettings;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Namespace holding the VMs and the UDN
    pub namespace: String,

    /// Traffic generator settings
    pub traffic: TrafficSettings,

    /// SSH access to the VMs
    pub ssh: SshConfig,

    /// UDN settings
    pub udn: UdnConfig,

    /// Address pinged by the egress check
    pub egress_destination: IpAddr,

    /// Timeout for ping checks in seconds
    pub ping_timeout_secs: u64,

    /// Timeout waiting for a live migration in seconds
    pub migration_timeout_secs: u64,

    /// Interval between status polls in seconds
    pub poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            traffic: TrafficSettings::default(),
            ssh: SshConfig::default(),
            udn: UdnConfig::default(),
            egress_destination: IpAddr::from([8, 8, 8, 8]),
            ping_timeout_secs: 60,
            migration_timeout_secs: 600,
            poll_interval_secs: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if file::is_yaml_file(path.as_ref()) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = if file::is_yaml_file(path.as_ref()) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(namespace) = &env.namespace {
            self.namespace = namespace.clone();
        }
        if let Some(timeout) = env.timeout {
            self.traffic.command_timeout_secs = timeout;
        }
        if let Some(binary) = &env.binary {
            self.traffic.binary = binary.clone();
        }
        if let Some(user) = &env.ssh_user {
            self.ssh.username = user.clone();
        }
        if let Some(key) = &env.ssh_key {
            self.ssh.private_key_path = Some(key.into());
        }
        if let Some(udn) = &env.udn {
            self.udn.name = udn.clone();
        }
    }

    /// Expand a leading `~/` in configured paths
    pub fn expand_paths(&mut self) {
        if let Some(key) = &self.ssh.private_key_path {
            self.ssh.private_key_path = Some(file::expand_path(&key.to_string_lossy()));
        }
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// UserDefinedNetwork settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UdnConfig {
    /// Name of the UserDefinedNetwork
    pub name: String,

    /// Seconds to wait for the UDN to become ready
    pub ready_timeout_secs: u64,
}

impl Default for UdnConfig {
    fn default() -> Self {
        Self {
            name: "layer2-udn".to_string(),
            ready_timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::StopScope;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.traffic.command_timeout_secs, 10);
        assert_eq!(config.egress_destination.to_string(), "8.8.8.8");
        assert_eq!(config.udn.name, "layer2-udn");
    }

    #[test]
    fn test_partial_yaml() {
        let config: AppConfig = serde_yaml::from_str(
            "namespace: udn-test\ntraffic:\n  stop_scope: binary\nssh:\n  username: cloud-user\n",
        )
        .unwrap();

        assert_eq!(config.namespace, "udn-test");
        assert_eq!(config.traffic.stop_scope, StopScope::Binary);
        assert_eq!(config.traffic.binary, "iperf3");
        assert_eq!(config.ssh.username, "cloud-user");
        assert_eq!(config.ssh.port, 22);
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.namespace = "udn-test".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.namespace, "udn-test");
    }

    #[test]
    fn test_apply_env() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            namespace: Some("udn-ci".to_string()),
            timeout: Some(20),
            ssh_key: Some("/keys/id_ed25519".to_string()),
            ..Default::default()
        };

        config.apply_env(&env);
        assert_eq!(config.namespace, "udn-ci");
        assert_eq!(config.traffic.command_timeout_secs, 20);
        assert!(config.ssh.private_key_path.is_some());
        assert_eq!(config.ssh.username, "fedora");
    }

    #[test]
    fn test_expand_paths_keeps_absolute_key() {
        let mut config = AppConfig::default();
        config.ssh.private_key_path = Some("/keys/id_ed25519".into());
        config.expand_paths();
        assert_eq!(
            config.ssh.private_key_path.as_deref(),
            Some(Path::new("/keys/id_ed25519"))
        );
    }
}
