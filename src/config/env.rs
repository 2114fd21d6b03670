//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "UDN_NETTEST";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Namespace from UDN_NETTEST_NAMESPACE
    pub namespace: Option<String>,
    /// Command timeout from UDN_NETTEST_TIMEOUT
    pub timeout: Option<u64>,
    /// Generator binary from UDN_NETTEST_BINARY
    pub binary: Option<String>,
    /// SSH user from UDN_NETTEST_SSH_USER
    pub ssh_user: Option<String>,
    /// SSH key from UDN_NETTEST_SSH_KEY
    pub ssh_key: Option<String>,
    /// UDN name from UDN_NETTEST_UDN
    pub udn: Option<String>,
    /// Config file from UDN_NETTEST_CONFIG
    pub config_file: Option<String>,
    /// Verbose from UDN_NETTEST_VERBOSE
    pub verbose: Option<bool>,
    /// Output format from UDN_NETTEST_FORMAT
    pub format: Option<String>,
    /// Kubeconfig from KUBECONFIG
    pub kubeconfig: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            namespace: get_env("NAMESPACE"),
            timeout: get_env_parse("TIMEOUT"),
            binary: get_env("BINARY"),
            ssh_user: get_env("SSH_USER"),
            ssh_key: get_env("SSH_KEY"),
            udn: get_env("UDN"),
            config_file: get_env("CONFIG"),
            verbose: get_env_bool("VERBOSE"),
            format: get_env("FORMAT"),
            kubeconfig: env::var("KUBECONFIG").ok(),
        }
    }

    /// Check if any UDN_NETTEST variables are set
    pub fn has_any(&self) -> bool {
        self.namespace.is_some()
            || self.timeout.is_some()
            || self.binary.is_some()
            || self.ssh_user.is_some()
            || self.ssh_key.is_some()
            || self.udn.is_some()
            || self.config_file.is_some()
            || self.verbose.is_some()
            || self.format.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_NAMESPACE: {:?}", ENV_PREFIX, self.namespace);
        println!("  {}_TIMEOUT:   {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_BINARY:    {:?}", ENV_PREFIX, self.binary);
        println!("  {}_SSH_USER:  {:?}", ENV_PREFIX, self.ssh_user);
        println!("  {}_SSH_KEY:   {:?}", ENV_PREFIX, self.ssh_key);
        println!("  {}_UDN:       {:?}", ENV_PREFIX, self.udn);
        println!("  {}_CONFIG:    {:?}", ENV_PREFIX, self.config_file);
        println!("  KUBECONFIG:            {:?}", self.kubeconfig);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    /// Create a new environment builder
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set an arbitrary UDN_NETTEST variable
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Set namespace
    pub fn namespace(self, namespace: impl Into<String>) -> Self {
        self.var("NAMESPACE", namespace)
    }

    /// Set command timeout
    pub fn timeout(self, timeout: u64) -> Self {
        self.var("TIMEOUT", timeout.to_string())
    }

    /// Set verbose
    pub fn verbose(self, verbose: bool) -> Self {
        self.var("VERBOSE", verbose.to_string())
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all UDN_NETTEST environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_NAMESPACE   Namespace of the VMs and the UDN");
    println!("  {ENV_PREFIX}_TIMEOUT     Remote command timeout in seconds");
    println!("  {ENV_PREFIX}_BINARY      Traffic generator binary (default iperf3)");
    println!("  {ENV_PREFIX}_SSH_USER    Guest SSH user");
    println!("  {ENV_PREFIX}_SSH_KEY     Guest SSH private key");
    println!("  {ENV_PREFIX}_UDN         UserDefinedNetwork name");
    println!("  {ENV_PREFIX}_CONFIG      Path to configuration file");
    println!("  {ENV_PREFIX}_VERBOSE     Enable verbose output (true/false)");
    println!("  {ENV_PREFIX}_FORMAT      Output format (table, json, json-pretty)");
    println!("  KUBECONFIG             Path to kubeconfig file");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_NAMESPACE=udn-test");
    println!("  udn-nettest connect --server-vm vmb-udn --client-vm vma-udn");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.namespace.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_builder() {
        let _guard = EnvBuilder::new()
            .namespace("udn-env-test")
            .timeout(25)
            .var("SSH_USER", "cloud-user")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.namespace, Some("udn-env-test".to_string()));
        assert_eq!(config.timeout, Some(25));
        assert_eq!(config.ssh_user, Some("cloud-user".to_string()));
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = EnvBuilder::new().verbose(true).apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.verbose, Some(true));
    }
}
