//! Output formatters for check results
//!
//! Provides JSON and Table output formats.

use serde::Serialize;

use crate::models::{CheckResult, CheckStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            _ => None,
        }
    }
}

/// Totals over a run of checks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

impl CheckSummary {
    pub fn from_results(results: &[CheckResult]) -> Self {
        results.iter().fold(Self::default(), |mut s, r| {
            s.total += 1;
            s.duration_ms += r.duration_ms;
            match r.status {
                CheckStatus::Pass => s.passed += 1,
                CheckStatus::Fail => s.failed += 1,
                CheckStatus::Error => s.errors += 1,
            }
            s
        })
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

#[derive(Serialize)]
struct RunReport<'a> {
    summary: CheckSummary,
    results: &'a [CheckResult],
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a single check result
    pub fn format_result(&self, result: &CheckResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_table(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
        }
    }

    fn status_label(&self, status: CheckStatus) -> String {
        let label = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return label;
        }
        let color = match status {
            CheckStatus::Pass => "32",
            CheckStatus::Fail | CheckStatus::Error => "31",
        };
        format!("\x1b[{color}m{label}\x1b[0m")
    }

    fn format_result_table(&self, result: &CheckResult) -> String {
        let mut line = format!(
            "{:32} {:8} [{:>7}ms]",
            result.check.name(),
            self.status_label(result.status),
            result.duration_ms
        );
        if let Some(msg) = &result.message {
            line.push_str("  ");
            line.push_str(msg);
        }
        line
    }

    /// Format a run of checks with its summary
    pub fn format_results(&self, results: &[CheckResult]) -> String {
        let summary = CheckSummary::from_results(results);
        match self.format {
            OutputFormat::Table => self.format_results_table(results, &summary),
            OutputFormat::Json => {
                serde_json::to_string(&RunReport { summary, results }).unwrap_or_default()
            }
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(&RunReport { summary, results }).unwrap_or_default()
            }
        }
    }

    fn format_results_table(&self, results: &[CheckResult], summary: &CheckSummary) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(" UDN Network Checks\n");
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        for result in results {
            output.push(' ');
            output.push_str(&self.format_result_table(result));
            output.push('\n');
        }

        output.push_str(" ───────────────────────────────────────────────────────────\n");

        let failed = summary.failed + summary.errors;
        let fail_str = if self.colorize && failed > 0 {
            format!("\x1b[31m{failed}\x1b[0m")
        } else {
            failed.to_string()
        };
        output.push_str(&format!(
            " Total: {} | Pass: {} | Fail: {} | Duration: {}ms\n",
            summary.total, summary.passed, fail_str, summary.duration_ms
        ));

        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckKind;

    fn results() -> Vec<CheckResult> {
        vec![
            CheckResult::pass(CheckKind::SubnetMembership, "10.10.0.5 in 10.10.0.0/24")
                .with_duration_ms(3),
            CheckResult::fail(CheckKind::EgressConnectivity, "ping timed out").with_duration_ms(60),
            CheckResult::error(CheckKind::TrafficConnection, "connection setup failed"),
        ]
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(
            OutputFormat::from_str("json-pretty"),
            Some(OutputFormat::JsonPretty)
        );
        assert_eq!(OutputFormat::from_str("csv"), None);
    }

    #[test]
    fn test_summary_counts() {
        let summary = CheckSummary::from_results(&results());
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.duration_ms, 63);
        assert!(!summary.all_passed());
        assert!(CheckSummary::default().all_passed());
    }

    #[test]
    fn test_format_table_without_color() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        let output = formatter.format_results(&results());

        assert!(output.contains("IP in UDN subnet"));
        assert!(output.contains("✓ PASS"));
        assert!(output.contains("ping timed out"));
        assert!(output.contains("Total: 3 | Pass: 1 | Fail: 2"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_format_single_result() {
        let result = CheckResult::fail(CheckKind::VmConnectivity, "10.10.0.7 unreachable")
            .with_duration_ms(42);

        let line = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_result(&result);
        assert!(line.starts_with("VM to VM connectivity"));
        assert!(line.contains("✗ FAIL"));
        assert!(line.contains("42ms"));
        assert!(line.ends_with("10.10.0.7 unreachable"));

        let json = ResultFormatter::new(OutputFormat::JsonPretty).format_result(&result);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["check"], "vm_connectivity");
        assert_eq!(value["duration_ms"], 42);
    }

    #[test]
    fn test_format_json() {
        let formatter = ResultFormatter::new(OutputFormat::Json);
        let output = formatter.format_results(&results());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["summary"]["passed"], 1);
        assert_eq!(value["results"][0]["check"], "subnet_membership");
        assert_eq!(value["results"][1]["status"], "fail");
    }
}
