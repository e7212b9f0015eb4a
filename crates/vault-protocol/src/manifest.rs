//! Persisted manifest record and reconstructed bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::kind::ArtifactKind;

/// Contract identifier stamped on every manifest written by this version.
pub const CONTRACT_VERSION: &str = "artifact-manifest@1";

/// A single payload file in an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Logical payload name
    pub name: String,

    /// Location relative to the artifact's object directory
    pub relative_path: String,

    /// SHA-256 of the canonical payload document
    pub sha256: String,

    /// Size in bytes of the stored payload
    pub size_bytes: u64,
}

/// Artifact manifest (one per committed artifact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    pub artifact_id: String,

    pub kind: ArtifactKind,

    pub created_at: DateTime<Utc>,

    pub contract_version: String,

    /// Payload files in logical (insertion) order
    pub files: Vec<FileEntry>,

    /// SHA-256 over the ordered `(name, sha256)` pairs of `files`
    pub root_sha256: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ArtifactManifest {
    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Total stored size of all payload files
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    /// Look up a file entry by payload name
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Whether any of `tags` is carried by this manifest
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// A committed artifact: manifest plus every payload document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub manifest: ArtifactManifest,
    pub payloads: BTreeMap<String, Value>,
}

impl ArtifactBundle {
    /// Payloads in manifest file order
    pub fn ordered_payloads(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.manifest
            .files
            .iter()
            .filter_map(|f| self.payloads.get(&f.name).map(|v| (f.name.as_str(), v)))
    }

    pub fn payload(&self, name: &str) -> Option<&Value> {
        self.payloads.get(name)
    }
}
