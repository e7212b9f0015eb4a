//! Deterministic, bounded projection of an artifact payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::kind::ArtifactKind;

/// Kind-specific summary of an artifact.
///
/// Every field is always serialized (absent optionals as `null`) so two
/// summaries of the same kind share one shape. Maps are ordered, so the JSON
/// form is byte-stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub kind: ArtifactKind,

    /// Version of the reduction that produced this summary
    pub summarizer_version: u32,

    /// Decision outcome label (kinds without a decision carry `None`)
    pub outcome: Option<String>,

    /// Confidence label attached to the outcome
    pub confidence: Option<String>,

    /// Bounded counts (claims, trace nodes, steps, omitted items, ...)
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,

    /// Event totals keyed by event type
    #[serde(default)]
    pub events_by_type: BTreeMap<String, u64>,

    /// Short informational labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Truncated list items, capped in count
    #[serde(default)]
    pub highlights: Vec<String>,

    /// Fixed-length excerpt of the main free-text field
    pub excerpt: Option<String>,
}

impl Summary {
    /// Empty summary of the given kind
    pub fn new(kind: ArtifactKind, summarizer_version: u32) -> Self {
        Self {
            kind,
            summarizer_version,
            outcome: None,
            confidence: None,
            counts: BTreeMap::new(),
            events_by_type: BTreeMap::new(),
            labels: BTreeMap::new(),
            highlights: Vec::new(),
            excerpt: None,
        }
    }

    /// Look up a count, defaulting to zero
    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_shape_is_fixed() {
        let summary = Summary::new(ArtifactKind::Bundle, 1);
        let value = serde_json::to_value(&summary).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "kind",
            "summarizerVersion",
            "outcome",
            "confidence",
            "counts",
            "eventsByType",
            "labels",
            "highlights",
            "excerpt",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert!(value["outcome"].is_null());
    }

    #[test]
    fn test_serialization_is_stable_regardless_of_insert_order() {
        let mut a = Summary::new(ArtifactKind::KernelRun, 1);
        a.counts.insert("claims".to_string(), 3);
        a.counts.insert("traceNodes".to_string(), 9);

        let mut b = Summary::new(ArtifactKind::KernelRun, 1);
        b.counts.insert("traceNodes".to_string(), 9);
        b.counts.insert("claims".to_string(), 3);

        assert_eq!(a, b);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.count("claims"), 3);
        assert_eq!(a.count("missing"), 0);
    }
}
