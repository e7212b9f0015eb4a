//! Closed enumeration of artifact kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Artifact kind.
///
/// Serialized in kebab-case (`kernel-run`, `orchestrator-run`, ...). The set is
/// closed: every kind has exactly one payload schema and one summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// A single decision kernel evaluation.
    KernelRun,
    /// A multi-step orchestrated decision.
    OrchestratorRun,
    /// Recap of a learner session.
    SessionRecap,
    /// A named collection of references to other artifacts.
    Bundle,
    /// An inbound contact inquiry.
    ContactInquiry,
}

/// Error returned when parsing an unknown kind string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown artifact kind: {0}")]
pub struct UnknownKind(pub String);

impl ArtifactKind {
    /// All kinds, in declaration order.
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::KernelRun,
        ArtifactKind::OrchestratorRun,
        ArtifactKind::SessionRecap,
        ArtifactKind::Bundle,
        ArtifactKind::ContactInquiry,
    ];

    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::KernelRun => "kernel-run",
            ArtifactKind::OrchestratorRun => "orchestrator-run",
            ArtifactKind::SessionRecap => "session-recap",
            ArtifactKind::Bundle => "bundle",
            ArtifactKind::ContactInquiry => "contact-inquiry",
        }
    }

    /// Name of the payload document the summarizer reads for this kind.
    pub fn primary_payload(&self) -> &'static str {
        match self {
            ArtifactKind::KernelRun => "kernel_run",
            ArtifactKind::OrchestratorRun => "orchestrator_run",
            ArtifactKind::SessionRecap => "session_recap",
            ArtifactKind::Bundle => "bundle",
            ArtifactKind::ContactInquiry => "contact_inquiry",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ArtifactKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == needle)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}
