//! Regression harness
//!
//! Re-fetches every golden artifact, summarizes it again and diffs the result
//! against the registered expectation. Reports contain no timestamps or
//! other run-specific data, so repeated runs over the same inputs serialize
//! identically.

use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;
use vault_protocol::error::redact_message;
use vault_protocol::{DiffEntry, DiffReport, GoldenCase, Severity, SuiteReport};
use vault_store::ArtifactStore;
use vault_summarizer::{diff_summaries, summarize};

/// Runs golden cases against the current store contents
#[derive(Debug, Clone)]
pub struct RegressionHarness {
    store: Arc<ArtifactStore>,
    parallel: bool,
}

impl RegressionHarness {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self {
            store,
            parallel: true,
        }
    }

    /// Run suite cases on the rayon pool (default) or sequentially
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Evaluate one case.
    ///
    /// Never fails: a missing or unreadable artifact and a payload that no
    /// longer summarizes each become a single critical entry.
    pub fn run_golden_case(&self, case: &GoldenCase) -> DiffReport {
        let entries = match self.store.get(&case.artifact_id) {
            Ok(Some(bundle)) => match summarize(bundle.manifest.kind, &bundle) {
                Ok(actual) => diff_summaries(&case.expected, &actual),
                Err(e) => vec![failure("summary", "summarizable", &e.to_string())],
            },
            Ok(None) => vec![failure("artifact", "present", "missing")],
            Err(e) => vec![failure("artifact", "readable", &e.to_boundary().to_string())],
        };

        let report = DiffReport::new(&case.artifact_id, &case.label, entries);
        if !report.passed() {
            tracing::debug!(
                artifact_id = %case.artifact_id,
                critical = report.critical_count,
                warn = report.warn_count,
                "golden case drifted"
            );
        }
        report
    }

    /// Evaluate every case independently. Report order matches `cases`.
    pub fn run_golden_suite(&self, cases: &[GoldenCase]) -> SuiteReport {
        let reports: Vec<DiffReport> = if self.parallel {
            cases.par_iter().map(|c| self.run_golden_case(c)).collect()
        } else {
            cases.iter().map(|c| self.run_golden_case(c)).collect()
        };

        let suite = SuiteReport::from_reports(reports);
        tracing::info!(
            total = suite.total_cases,
            passed = suite.passed_cases,
            failed = suite.failed_cases,
            critical = suite.critical_count,
            warn = suite.warn_count,
            "golden suite finished"
        );
        suite
    }
}

fn failure(path: &str, expected: &str, actual: &str) -> DiffEntry {
    DiffEntry::new(
        path,
        Value::String(expected.to_string()),
        Value::String(redact_message(actual)),
        Severity::Critical,
    )
}
