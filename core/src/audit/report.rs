//! # Audit Report Types
//!
//! The validator's output is data, not exceptions: one result per
//! check, a roll-up summary, everything serializable so the host
//! application's dashboard can render it directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// CheckStatus
// ---------------------------------------------------------------------------

/// Outcome of one consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The invariant holds.
    Success,
    /// Something needs human attention but isn't an integrity breach
    /// (an uncompensated variance, for instance).
    Warning,
    /// The invariant is violated.
    Error,
}

// ---------------------------------------------------------------------------
// CheckResult
// ---------------------------------------------------------------------------

/// One check's result: name, status, a human-readable message, and an
/// optional structured payload listing the offenders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Stable check name, e.g. `entry_balance`.
    pub name: String,
    /// Outcome.
    pub status: CheckStatus,
    /// One line for a human.
    pub message: String,
    /// Structured detail for drill-down rendering; `None` when clean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl CheckResult {
    /// A passing result.
    pub fn success(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Success,
            message: message.into(),
            detail: None,
        }
    }

    /// A warning with offender detail.
    pub fn warning(name: &str, message: impl Into<String>, detail: Value) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.into(),
            detail: Some(detail),
        }
    }

    /// A failure with offender detail.
    pub fn error(name: &str, message: impl Into<String>, detail: Value) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.into(),
            detail: Some(detail),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Roll-up of a full battery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Checks run.
    pub total: usize,
    /// Checks that passed outright.
    pub passed: usize,
    /// Checks that found an integrity violation.
    pub failed: usize,
    /// Checks that raised a warning.
    pub warnings: usize,
}

/// A complete audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Roll-up counts.
    pub summary: Summary,
    /// Every check, in battery order.
    pub checks: Vec<CheckResult>,
}

impl Report {
    /// Assembles a report from individual results.
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        let summary = Summary {
            total: checks.len(),
            passed: checks
                .iter()
                .filter(|c| c.status == CheckStatus::Success)
                .count(),
            failed: checks
                .iter()
                .filter(|c| c.status == CheckStatus::Error)
                .count(),
            warnings: checks
                .iter()
                .filter(|c| c.status == CheckStatus::Warning)
                .count(),
        };
        Self { summary, checks }
    }

    /// `true` if no check errored (warnings allowed).
    pub fn is_clean(&self) -> bool {
        self.summary.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_counts_by_status() {
        let report = Report::from_checks(vec![
            CheckResult::success("a", "ok"),
            CheckResult::success("b", "ok"),
            CheckResult::warning("c", "look", json!({"id": 1})),
            CheckResult::error("d", "broken", json!([1, 2])),
        ]);
        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.passed, 2);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.failed, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn clean_report_tolerates_warnings() {
        let report = Report::from_checks(vec![
            CheckResult::success("a", "ok"),
            CheckResult::warning("b", "look", json!({})),
        ]);
        assert!(report.is_clean());
    }

    #[test]
    fn clean_results_omit_detail_in_json() {
        let json = serde_json::to_string(&CheckResult::success("a", "ok")).unwrap();
        assert!(!json.contains("detail"));
        assert!(json.contains("\"status\":\"success\""));
    }

    #[test]
    fn report_serde_roundtrip() {
        let report = Report::from_checks(vec![CheckResult::error(
            "entry_balance",
            "1 unbalanced entry",
            json!([{"agency_id": 1, "entry_id": 4}]),
        )]);
        let json = serde_json::to_string(&report).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }
}
