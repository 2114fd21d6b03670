//! Data models for UDN network checks

mod check_result;

pub use check_result::{CheckKind, CheckResult, CheckStatus};
