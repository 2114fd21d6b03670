//! Traffic generator settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-command timeout in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// Default traffic generator binary
pub const DEFAULT_BINARY: &str = "iperf3";

/// How `stop` selects the processes to terminate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopScope {
    /// Only processes whose full command line equals the endpoint's command
    #[default]
    ExactCommand,
    /// Every process of the generator binary on the target
    Binary,
}

impl StopScope {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "exact" | "exact-command" => Some(StopScope::ExactCommand),
            "binary" => Some(StopScope::Binary),
            _ => None,
        }
    }
}

/// Settings shared by every endpoint of a connection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficSettings {
    /// Traffic generator binary
    pub binary: String,

    /// Timeout for each remote command in seconds
    pub command_timeout_secs: u64,

    /// Termination scope used by `stop`
    pub stop_scope: StopScope,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            stop_scope: StopScope::default(),
        }
    }
}

impl TrafficSettings {
    /// Set the generator binary
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the command timeout
    pub fn timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    /// Set the stop scope
    pub fn stop_scope(mut self, scope: StopScope) -> Self {
        self.stop_scope = scope;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
