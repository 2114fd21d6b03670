//! Traffic generator endpoints
//!
//! An endpoint is one side of a traffic test: an iperf3 server or client
//! bound to one remote target. Its command line is fixed at construction and
//! doubles as its process identity, since the transport offers no handle for
//! the process it launched.

use std::fmt;
use std::net::IpAddr;
use tracing::{debug, info};

use super::error::CommandExecutionError;
use super::executor::RemoteTarget;
use super::settings::{StopScope, TrafficSettings};

/// Endpoint role
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => write!(f, "server"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// One side of a traffic test
#[derive(Clone)]
pub struct TrafficEndpoint {
    name: String,
    role: Role,
    command: String,
    target: RemoteTarget,
    settings: TrafficSettings,
}

impl TrafficEndpoint {
    /// Daemonized listener on `port` that exits after serving one client
    pub fn server(
        name: impl Into<String>,
        target: RemoteTarget,
        port: u16,
        settings: &TrafficSettings,
    ) -> Self {
        let command = format!(
            "{} --server --port {port} --one-off --daemon",
            settings.binary
        );
        Self {
            name: name.into(),
            role: Role::Server,
            command,
            target,
            settings: settings.clone(),
        }
    }

    /// Client streaming to `server_ip:port` until stopped
    pub fn client(
        name: impl Into<String>,
        target: RemoteTarget,
        server_ip: IpAddr,
        port: u16,
        settings: &TrafficSettings,
    ) -> Self {
        let command = format!(
            "{} --client {server_ip} --time 0 --port {port}",
            settings.binary
        );
        Self {
            name: name.into(),
            role: Role::Client,
            command,
            target,
            settings: settings.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The command line identifying this endpoint's process
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn target_name(&self) -> &str {
        self.target.name()
    }

    /// Command issued by `start`
    pub fn launch_command(&self) -> String {
        match self.role {
            Role::Server => self.command.clone(),
            Role::Client => format!("nohup {} >/dev/null 2>&1 &", self.command),
        }
    }

    /// Command issued by `is_running`
    pub fn lookup_command(&self) -> String {
        format!("pgrep -ofAx {}", exact_pattern(&self.command))
    }

    /// Command issued by `stop`
    pub fn stop_command(&self) -> String {
        match self.settings.stop_scope {
            StopScope::ExactCommand => format!("pkill -x -f {}", exact_pattern(&self.command)),
            StopScope::Binary => format!("pkill -x {}", shell_quote(&self.settings.binary)),
        }
    }

    async fn run(&self, command: String) -> Result<(), CommandExecutionError> {
        debug!("{} {} on {}: {}", self.role, self.name, self.target.name(), command);
        self.target
            .execute(&[command], self.settings.command_timeout())
            .await
    }

    /// Launch the process. Fails only when the launch itself fails.
    pub async fn start(&self) -> Result<(), CommandExecutionError> {
        info!("Starting {} {} on {}", self.role, self.name, self.target.name());
        self.run(self.launch_command()).await
    }

    /// Terminate the process. Finding nothing to terminate is not an error.
    pub async fn stop(&self) -> Result<(), CommandExecutionError> {
        info!("Stopping {} {} on {}", self.role, self.name, self.target.name());
        match self.run(self.stop_command()).await {
            Err(e) if e.is_no_match() => {
                debug!(
                    "No {} process left to stop on {}",
                    self.role,
                    self.target.name()
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Whether a process with exactly this endpoint's command line exists.
    ///
    /// Never fails: any execution error reads as "not running".
    pub async fn is_running(&self) -> bool {
        match self.run(self.lookup_command()).await {
            Ok(()) => true,
            Err(e) => {
                info!(
                    "{} {} is not running on {}: {}",
                    self.role,
                    self.name,
                    self.target.name(),
                    e
                );
                false
            }
        }
    }
}

impl fmt::Debug for TrafficEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrafficEndpoint")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("target", &self.target.name())
            .field("command", &self.command)
            .finish()
    }
}

/// Quote a string for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Shell-quoted regex matching `command` literally
pub fn exact_pattern(command: &str) -> String {
    let mut escaped = String::with_capacity(command.len());
    for c in command.chars() {
        if r"\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    shell_quote(&escaped)
}
