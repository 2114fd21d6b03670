//! SSH transport for running commands inside KubeVirt VMs
//!
//! [`SshTarget`] implements [`RemoteExecutor`] either by reaching the guest
//! directly with `ssh` or by tunnelling through `virtctl ssh`, which works
//! without a route to the VM's primary network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::traffic::{CommandExecutionError, RemoteExecutor};

/// How the guest is reached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SshRoute {
    /// `virtctl ssh vmi/<name>`
    #[default]
    Virtctl,
    /// `ssh user@<address>`
    Direct,
}

/// SSH client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// SSH username
    pub username: String,

    /// SSH private key path
    pub private_key_path: Option<PathBuf>,

    /// SSH port
    pub port: u16,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Strict host key checking
    pub strict_host_key_checking: bool,

    /// Route used to reach the guest
    pub route: SshRoute,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: "fedora".to_string(),
            private_key_path: None,
            port: 22,
            connect_timeout_secs: 10,
            strict_host_key_checking: false,
            route: SshRoute::default(),
        }
    }
}

impl SshConfig {
    /// Create a new SSH config
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Set private key path
    pub fn private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// Set port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set route
    pub fn route(mut self, route: SshRoute) -> Self {
        self.route = route;
        self
    }

    fn ssh_options(&self) -> Vec<String> {
        vec![
            format!(
                "StrictHostKeyChecking={}",
                if self.strict_host_key_checking {
                    "yes"
                } else {
                    "no"
                }
            ),
            "UserKnownHostsFile=/dev/null".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "BatchMode=yes".to_string(),
            "LogLevel=ERROR".to_string(),
        ]
    }
}

/// A VM reachable over SSH
pub struct SshTarget {
    name: String,
    namespace: String,
    address: Option<String>,
    config: SshConfig,
}

impl SshTarget {
    /// Target the VMI `name` in `namespace`
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, config: SshConfig) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            address: None,
            config,
        }
    }

    /// Address used by the direct route
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Program and arguments that run `command` on the guest
    fn build_args(&self, command: &str) -> Vec<String> {
        match self.config.route {
            SshRoute::Virtctl => self.virtctl_args(command),
            SshRoute::Direct => self.direct_args(command),
        }
    }

    fn virtctl_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "virtctl".to_string(),
            "ssh".to_string(),
            "--namespace".to_string(),
            self.namespace.clone(),
            "--username".to_string(),
            self.config.username.clone(),
            "--port".to_string(),
            self.config.port.to_string(),
            "--local-ssh=true".to_string(),
        ];

        for option in self.config.ssh_options() {
            args.push("--local-ssh-opts".to_string());
            args.push(format!("-o {option}"));
        }

        if let Some(ref key_path) = self.config.private_key_path {
            args.push("--identity-file".to_string());
            args.push(key_path.to_string_lossy().to_string());
        }

        args.push("--command".to_string());
        args.push(command.to_string());
        args.push(format!("vmi/{}", self.name));
        args
    }

    fn direct_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["ssh".to_string()];

        for option in self.config.ssh_options() {
            args.push("-o".to_string());
            args.push(option);
        }

        args.push("-p".to_string());
        args.push(self.config.port.to_string());

        if let Some(ref key_path) = self.config.private_key_path {
            args.push("-i".to_string());
            args.push(key_path.to_string_lossy().to_string());
        }

        let host = self.address.as_deref().unwrap_or(&self.name);
        args.push(format!("{}@{}", self.config.username, host));
        args.push(command.to_string());
        args
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<(), CommandExecutionError> {
        debug!("Executing on {}: {}", self.name, command);
        self.run_program(&self.build_args(command), command, timeout)
            .await
    }

    async fn run_program(
        &self,
        args: &[String],
        command: &str,
        timeout: Duration,
    ) -> Result<(), CommandExecutionError> {
        let output = Command::new(&args[0])
            .args(&args[1..])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandExecutionError::Transport {
                    target: self.name.clone(),
                    command: command.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(CommandExecutionError::Timeout {
                    target: self.name.clone(),
                    command: command.to_string(),
                    timeout,
                })
            }
        };

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                debug!("{} stdout: {}", self.name, stdout.trim());
            }
            Ok(())
        } else {
            Err(CommandExecutionError::Failed {
                target: self.name.clone(),
                command: command.to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<(), CommandExecutionError> {
        for command in commands {
            self.run(command, timeout).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_config_builder() {
        let config = SshConfig::new("cloud-user")
            .port(2222)
            .private_key("/tmp/id_ed25519")
            .route(SshRoute::Direct);

        assert_eq!(config.username, "cloud-user");
        assert_eq!(config.port, 2222);
        assert_eq!(config.route, SshRoute::Direct);
    }

    #[test]
    fn test_virtctl_args() {
        let target = SshTarget::new("vma-udn", "udn-test", SshConfig::default());
        let args = target.build_args("pgrep -ofAx 'iperf3'");

        assert_eq!(args[0], "virtctl");
        assert!(args.contains(&"udn-test".to_string()));
        assert!(args.contains(&"pgrep -ofAx 'iperf3'".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("vmi/vma-udn"));

        let local = args.iter().position(|a| a == "--local-ssh=true").unwrap();
        let first_opt = args.iter().position(|a| a == "--local-ssh-opts").unwrap();
        assert!(local < first_opt);
        assert!(args.contains(&"-o BatchMode=yes".to_string()));
    }

    #[test]
    fn test_direct_args() {
        let target = SshTarget::new(
            "vmb-udn",
            "udn-test",
            SshConfig::default().route(SshRoute::Direct),
        )
        .with_address("192.168.1.100");
        let args = target.build_args("true");

        assert_eq!(args[0], "ssh");
        assert!(args.contains(&"fedora@192.168.1.100".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_missing_program_is_transport_error() {
        let target = SshTarget::new("vma-udn", "udn-test", SshConfig::default());
        let err = target
            .run_program(
                &["/nonexistent/udn-nettest-ssh".to_string()],
                "true",
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CommandExecutionError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let target = SshTarget::new("vma-udn", "udn-test", SshConfig::default());
        let err = target
            .run_program(&["false".to_string()], "false", Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.target(), "vma-udn");
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let target = SshTarget::new("vma-udn", "udn-test", SshConfig::default());
        let err = target
            .run_program(
                &["sleep".to_string(), "5".to_string()],
                "sleep 5",
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CommandExecutionError::Timeout { .. }));
    }
}
