//! Output formatting module
//!
//! Provides table and JSON output for check results.

mod formatter;

pub use formatter::{CheckSummary, OutputFormat, ResultFormatter};
