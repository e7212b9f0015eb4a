//! Typed payload schemas, one per artifact kind.
//!
//! Only the fields a summary is built from are declared. Anything else in a
//! payload (timestamps, request ids, hosts, emails) is dropped at parse time.

use serde::Deserialize;
use serde_json::Value;
use vault_protocol::ArtifactKind;

use crate::summarize::SummarizationError;

/// A claim made by a kernel run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claim {
    pub text: String,
    #[serde(default)]
    pub supported: Option<bool>,
}

/// A node of a kernel run's reasoning trace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraceNode {
    pub id: String,
    pub kind: String,
}

/// An orchestrator step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: String,
}

/// A typed event record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KernelRunPayload {
    pub outcome: String,
    pub confidence: String,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub trace: Vec<TraceNode>,
    #[serde(default)]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrchestratorRunPayload {
    pub decision: String,
    pub confidence: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionRecapPayload {
    pub headline: String,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlePayload {
    pub title: String,
    #[serde(default)]
    pub artifact_refs: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Inbound inquiry. Contact details are not modelled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactInquiryPayload {
    pub topic: String,
    pub message: String,
}

/// Closed union of payload schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    KernelRun(KernelRunPayload),
    OrchestratorRun(OrchestratorRunPayload),
    SessionRecap(SessionRecapPayload),
    Bundle(BundlePayload),
    ContactInquiry(ContactInquiryPayload),
}

impl ArtifactPayload {
    /// Parse a payload document against the schema for `kind`.
    pub fn parse(kind: ArtifactKind, document: &Value) -> Result<Self, SummarizationError> {
        let shape = |e: serde_json::Error| SummarizationError::InvalidShape {
            kind,
            detail: shape_detail(&e),
        };
        let payload = match kind {
            ArtifactKind::KernelRun => {
                ArtifactPayload::KernelRun(KernelRunPayload::deserialize(document).map_err(shape)?)
            }
            ArtifactKind::OrchestratorRun => ArtifactPayload::OrchestratorRun(
                OrchestratorRunPayload::deserialize(document).map_err(shape)?,
            ),
            ArtifactKind::SessionRecap => ArtifactPayload::SessionRecap(
                SessionRecapPayload::deserialize(document).map_err(shape)?,
            ),
            ArtifactKind::Bundle => {
                ArtifactPayload::Bundle(BundlePayload::deserialize(document).map_err(shape)?)
            }
            ArtifactKind::ContactInquiry => ArtifactPayload::ContactInquiry(
                ContactInquiryPayload::deserialize(document).map_err(shape)?,
            ),
        };
        Ok(payload)
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactPayload::KernelRun(_) => ArtifactKind::KernelRun,
            ArtifactPayload::OrchestratorRun(_) => ArtifactKind::OrchestratorRun,
            ArtifactPayload::SessionRecap(_) => ArtifactKind::SessionRecap,
            ArtifactPayload::Bundle(_) => ArtifactKind::Bundle,
            ArtifactPayload::ContactInquiry(_) => ArtifactKind::ContactInquiry,
        }
    }
}

/// Describe a schema mismatch without echoing payload content.
///
/// serde quotes the offending value in type errors, so only the schema side
/// of the message (field names, expected type) is kept.
fn shape_detail(err: &serde_json::Error) -> String {
    let message = err.to_string();
    if message.starts_with("missing field") || message.starts_with("duplicate field") {
        return message;
    }
    match message.rsplit_once(", expected ") {
        Some((_, expected)) => format!("a field has the wrong type, expected {}", expected),
        None => "document does not match the schema".to_string(),
    }
}
