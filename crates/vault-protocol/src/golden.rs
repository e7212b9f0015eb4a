//! Registered regression baseline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::summary::Summary;

/// A golden case: an artifact plus the summary it is expected to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenCase {
    pub artifact_id: String,

    /// Human label, at most 60 characters
    pub label: String,

    pub expected: Summary,

    /// Skipped cases stay registered but are left out of the active suite
    #[serde(default)]
    pub skip: bool,

    pub added_at: DateTime<Utc>,
}
