//! Traffic generator orchestration
//!
//! Starts, verifies and tears down an iperf3 server/client pair running on
//! two remote targets. All remote work goes through [`RemoteExecutor`].

mod connection;
mod endpoint;
mod error;
mod executor;
mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{connection, connection_with_settings, ActiveConnection, Connection};
pub use endpoint::{exact_pattern, shell_quote, Role, TrafficEndpoint};
pub use error::{CommandExecutionError, TrafficError, NO_PROCESS_MATCHED};
pub use executor::{RemoteExecutor, RemoteTarget};
pub use settings::{StopScope, TrafficSettings, DEFAULT_BINARY, DEFAULT_COMMAND_TIMEOUT_SECS};
