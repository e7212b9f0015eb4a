//! Deterministic artifact summarization.
//!
//! Each artifact kind has one typed payload schema. The summarizer reduces a
//! payload to a bounded, fixed-shape [`Summary`] that never carries
//! timestamps, identifiers, host names or paths, and the diff engine compares
//! two summaries field by field.

mod diff;
mod payload;
mod summarize;

pub use diff::{diff_summaries, severity_for, CRITICAL_FIELDS};
pub use payload::{
    ArtifactPayload, BundlePayload, Claim, ContactInquiryPayload, Event, KernelRunPayload,
    OrchestratorRunPayload, SessionRecapPayload, Step, TraceNode,
};
pub use summarize::{
    summarize, summarize_payload, SummarizationError, MAX_EVENT_TYPES, MAX_EXCERPT_CHARS,
    MAX_HIGHLIGHTS, MAX_TEXT_CHARS, SUMMARIZER_VERSION,
};

pub use vault_protocol::Summary;
