//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::AppConfig;
use crate::kubevirt::SshRoute;
use crate::traffic::StopScope;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./udn-nettest.yaml",
    "./udn-nettest.yml",
    "./.udn-nettest.yaml",
    "~/.config/udn-nettest/config.yaml",
];

/// Supported config file versions
const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::find() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        let app = &self.app;
        if app.namespace.trim().is_empty() {
            anyhow::bail!("namespace must not be empty");
        }
        if app.traffic.binary.trim().is_empty() {
            anyhow::bail!("traffic.binary must not be empty");
        }
        if app.traffic.binary.contains(char::is_whitespace) {
            anyhow::bail!(
                "traffic.binary '{}' must be a single program name",
                app.traffic.binary
            );
        }
        if app.traffic.command_timeout_secs == 0 {
            anyhow::bail!("traffic.command_timeout_secs must be greater than 0");
        }
        if app.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than 0");
        }
        if app.ssh.username.trim().is_empty() {
            anyhow::bail!("ssh.username must not be empty");
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut app = AppConfig {
            namespace: "udn-test".to_string(),
            ..AppConfig::default()
        };
        app.traffic.stop_scope = StopScope::ExactCommand;
        app.ssh.route = SshRoute::Virtctl;
        app.ssh.private_key_path = Some(PathBuf::from("~/.ssh/id_ed25519"));

        Self {
            version: default_version(),
            app,
        }
    }
}

/// Expand ~ to home directory
pub(crate) fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
