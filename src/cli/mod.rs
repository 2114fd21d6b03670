//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::net::IpAddr;

/// Network checks for KubeVirt VMs on an OVN-Kubernetes primary UDN
#[derive(Parser, Debug)]
#[command(name = "udn-nettest")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Verify VM connectivity and live-migration behaviour on a primary UDN")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Namespace of the VMs and the UDN
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Output format (table, json, json-pretty)
    #[arg(short, long, global = true, default_value = "table")]
    pub format: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Keep an iperf3 connection open between two VMs
    Connect(ConnectArgs),

    /// Check a VM's primary IP lies in the UDN subnets
    Subnet(SubnetArgs),

    /// Ping an external address from a VM
    Egress(EgressArgs),

    /// Ping one VM from another
    Ping(PingArgs),

    /// Check IP and traffic survive a live migration
    Migration(MigrationArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for connect command
#[derive(Parser, Debug)]
pub struct ConnectArgs {
    /// VM running the iperf3 server
    #[arg(long)]
    pub server_vm: String,

    /// VM running the iperf3 client
    #[arg(long)]
    pub client_vm: String,

    /// Server port
    #[arg(short, long, default_value = "5201")]
    pub port: u16,

    /// Seconds to keep the connection open
    #[arg(long, default_value = "0")]
    pub hold: u64,

    /// Seconds between liveness samples while holding
    #[arg(long, default_value = "5")]
    pub interval: u64,
}

/// Arguments for subnet command
#[derive(Parser, Debug)]
pub struct SubnetArgs {
    /// VM to check
    #[arg(long)]
    pub vm: String,

    /// UserDefinedNetwork name (defaults to the configured one)
    #[arg(long)]
    pub udn: Option<String>,
}

/// Arguments for egress command
#[derive(Parser, Debug)]
pub struct EgressArgs {
    /// VM to ping from
    #[arg(long)]
    pub vm: String,

    /// Address to ping (defaults to the configured one)
    #[arg(short, long)]
    pub destination: Option<IpAddr>,
}

/// Arguments for ping command
#[derive(Parser, Debug)]
pub struct PingArgs {
    /// VM to ping from
    #[arg(long)]
    pub from: String,

    /// VM whose primary IP is pinged
    #[arg(long)]
    pub to: String,
}

/// Arguments for migration command
#[derive(Parser, Debug)]
pub struct MigrationArgs {
    /// VM being migrated
    #[arg(long)]
    pub vm: String,

    /// Seconds to wait for the migration to complete
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Peer VM running the iperf3 server during the migration
    #[arg(long)]
    pub peer_vm: Option<String>,

    /// Server port on the peer VM
    #[arg(short, long, default_value = "5201")]
    pub port: u16,
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "udn-nettest.yaml")]
        path: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// List supported environment variables
    Env,
}
