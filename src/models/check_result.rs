//! Check result models for UDN network verification
//!
//! Defines check kinds, results, and status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network checks run against VMs on a primary UDN
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    SubnetMembership,
    IpPreservedAfterMigration,
    EgressConnectivity,
    VmConnectivity,
    TrafficConnection,
    TrafficAfterMigration,
}

impl CheckKind {
    /// Get check name
    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::SubnetMembership => "IP in UDN subnet",
            CheckKind::IpPreservedAfterMigration => "IP preserved after migration",
            CheckKind::EgressConnectivity => "Egress connectivity",
            CheckKind::VmConnectivity => "VM to VM connectivity",
            CheckKind::TrafficConnection => "TCP traffic connection",
            CheckKind::TrafficAfterMigration => "TCP traffic survives migration",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Check outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Error,
}

impl CheckStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "✓",
            CheckStatus::Fail => "✗",
            CheckStatus::Error => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckStatus::Pass)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Fail => write!(f, "FAIL"),
            CheckStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of a single check
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: CheckKind,
    pub status: CheckStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CheckResult {
    fn new(check: CheckKind, status: CheckStatus, message: Option<String>) -> Self {
        Self {
            check,
            status,
            duration_ms: 0,
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn pass(check: CheckKind, message: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Pass, Some(message.into()))
    }

    pub fn fail(check: CheckKind, message: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Fail, Some(message.into()))
    }

    pub fn error(check: CheckKind, error: impl Into<String>) -> Self {
        Self::new(check, CheckStatus::Error, Some(error.into()))
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.check,
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}
