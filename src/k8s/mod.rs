//! Kubernetes API client module
//!
//! Shared client handle for the KubeVirt and UDN lookups.

mod client;

pub use client::{K8sClient, REQUIRED_CRDS};
