//! Diff and suite reports produced by the regression harness.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How much a summary mismatch matters to decision correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational drift (counts, labels, excerpts)
    Warn,
    /// The decision itself changed, or the case could not be evaluated
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => write!(f, "Warn"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

/// One field-level mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Dotted path into the summary (`outcome`, `counts.claims`, `highlights[2]`)
    pub path: String,
    pub expected: Value,
    pub actual: Value,
    pub severity: Severity,
}

impl DiffEntry {
    pub fn new(path: impl Into<String>, expected: Value, actual: Value, severity: Severity) -> Self {
        Self {
            path: path.into(),
            expected,
            actual,
            severity,
        }
    }
}

/// Result of running one golden case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub artifact_id: String,
    pub label: String,
    /// Mismatches in deterministic path order; empty means the case passed
    pub entries: Vec<DiffEntry>,
    pub critical_count: usize,
    pub warn_count: usize,
}

impl DiffReport {
    /// Build a report, deriving the aggregate counts from `entries`
    pub fn new(artifact_id: impl Into<String>, label: impl Into<String>, entries: Vec<DiffEntry>) -> Self {
        let critical_count = entries
            .iter()
            .filter(|e| e.severity == Severity::Critical)
            .count();
        let warn_count = entries.len() - critical_count;
        Self {
            artifact_id: artifact_id.into(),
            label: label.into(),
            entries,
            critical_count,
            warn_count,
        }
    }

    pub fn passed(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Aggregate over a suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
    pub total_cases: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub critical_count: usize,
    pub warn_count: usize,
    /// Per-case reports in input order
    pub cases: Vec<DiffReport>,
}

impl SuiteReport {
    /// Aggregate per-case reports, preserving their order
    pub fn from_reports(cases: Vec<DiffReport>) -> Self {
        let passed_cases = cases.iter().filter(|c| c.passed()).count();
        Self {
            total_cases: cases.len(),
            passed_cases,
            failed_cases: cases.len() - passed_cases,
            critical_count: cases.iter().map(|c| c.critical_count).sum(),
            warn_count: cases.iter().map(|c| c.warn_count).sum(),
            cases,
        }
    }

    /// A suite fails only on critical drift; warnings alone do not fail it
    pub fn is_failing(&self) -> bool {
        self.critical_count > 0
    }

    /// One-line human summary
    pub fn human_summary(&self) -> String {
        format!(
            "{}/{} cases passed ({} critical, {} warn)",
            self.passed_cases, self.total_cases, self.critical_count, self.warn_count
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
