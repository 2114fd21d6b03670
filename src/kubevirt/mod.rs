//! KubeVirt integration module
//!
//! SSH command execution inside VMs and read-only VMI status lookups.

mod ssh;
mod vmi;

pub use ssh::{SshConfig, SshRoute, SshTarget};
pub use vmi::{
    interface_ip, primary_ip, primary_network, MigrationState, VirtualMachineInstance,
    VirtualMachineInstanceSpec, VirtualMachineInstanceStatus, VmiInterface, VmiManager,
    VmiNetwork, VmiPhase,
};
