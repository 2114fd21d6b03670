//! Error types for traffic generator orchestration

use std::time::Duration;
use thiserror::Error;

/// Exit status `pkill`/`pgrep` use when no process matched
pub const NO_PROCESS_MATCHED: i32 = 1;

/// A remote command failed to run or exceeded its timeout
#[derive(Error, Debug)]
pub enum CommandExecutionError {
    #[error("command `{command}` failed on {target} (exit code {exit_code:?}): {stderr}")]
    Failed {
        target: String,
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("command `{command}` timed out on {target} after {timeout:?}")]
    Timeout {
        target: String,
        command: String,
        timeout: Duration,
    },

    #[error("failed to run `{command}` on {target}: {source}")]
    Transport {
        target: String,
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandExecutionError {
    /// Name of the target the command ran against
    pub fn target(&self) -> &str {
        match self {
            CommandExecutionError::Failed { target, .. }
            | CommandExecutionError::Timeout { target, .. }
            | CommandExecutionError::Transport { target, .. } => target,
        }
    }

    /// The offending command
    pub fn command(&self) -> &str {
        match self {
            CommandExecutionError::Failed { command, .. }
            | CommandExecutionError::Timeout { command, .. }
            | CommandExecutionError::Transport { command, .. } => command,
        }
    }

    /// Remote exit code, when the command ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandExecutionError::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// True when a process lookup/termination command simply found nothing
    pub fn is_no_match(&self) -> bool {
        self.exit_code() == Some(NO_PROCESS_MATCHED)
    }
}

/// Errors surfaced by endpoints and connections
#[derive(Error, Debug)]
pub enum TrafficError {
    #[error(transparent)]
    Command(#[from] CommandExecutionError),

    #[error(
        "connection setup failed: server {server} running={server_running}, \
         client {client} running={client_running}"
    )]
    ConnectionSetup {
        server: String,
        client: String,
        server_running: bool,
        client_running: bool,
    },

    #[error("connection teardown failed: {}", join_failures(.0))]
    Teardown(Vec<CommandExecutionError>),
}

fn join_failures(failures: &[CommandExecutionError]) -> String {
    failures
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
