//! UDN network checks for KubeVirt virtual machines
//!
//! Library side of `udn-nettest`: iperf3 connection orchestration between
//! VMs, UserDefinedNetwork and VMI lookups, and the network checks built on
//! top of them.

pub mod cli;
pub mod config;
pub mod k8s;
pub mod kubevirt;
pub mod models;
pub mod output;
pub mod traffic;
pub mod udn;
pub mod utils;

pub use models::{CheckKind, CheckResult, CheckStatus};
pub use traffic::{
    connection, connection_with_settings, ActiveConnection, CommandExecutionError, Connection,
    RemoteExecutor, RemoteTarget, TrafficError,
};
