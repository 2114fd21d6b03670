//! Primary UserDefinedNetwork support
//!
//! UDN resource lookups, subnet membership and the network checks run
//! against VMs attached to a primary UDN.

mod checks;
mod network;
mod subnet;

pub use checks::{
    check_ip_in_subnets, check_ip_preserved, check_ping, check_traffic, check_traffic_survives,
    hold_connection, HoldReport, PING_COUNT,
};
pub use network::{
    IpamConfig, Layer2Config, Layer3Config, Layer3Subnet, UdnCondition, UdnManager,
    UserDefinedNetwork, UserDefinedNetworkSpec, UserDefinedNetworkStatus,
};
pub use subnet::Subnet;
