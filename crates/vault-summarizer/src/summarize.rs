//! Per-kind reduction of a payload into a bounded [`Summary`].

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use vault_protocol::{ArtifactBundle, ArtifactKind, Summary};

use crate::payload::{
    ArtifactPayload, BundlePayload, ContactInquiryPayload, Event, KernelRunPayload,
    OrchestratorRunPayload, SessionRecapPayload,
};

/// Bumped whenever the reduction below changes what a summary contains.
pub const SUMMARIZER_VERSION: u32 = 1;

/// Longest string kept in a label, outcome or highlight.
pub const MAX_TEXT_CHARS: usize = 120;

/// Longest excerpt of a free-text field.
pub const MAX_EXCERPT_CHARS: usize = 160;

/// Highlights kept per summary; the rest are counted in `highlightsOmitted`.
pub const MAX_HIGHLIGHTS: usize = 16;

/// Distinct event types kept; the rest are folded into `other`.
pub const MAX_EVENT_TYPES: usize = 24;

const OTHER_EVENTS: &str = "other";

/// Hex characters kept from a free-text fingerprint.
const FINGERPRINT_HEX_CHARS: usize = 12;

/// Why a summary could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummarizationError {
    #[error("{kind} payload does not match its schema: {detail}")]
    InvalidShape { kind: ArtifactKind, detail: String },

    #[error("{kind} artifact has no payload to summarize")]
    MissingPayload { kind: ArtifactKind },

    #[error("artifact is a {actual}, not a {expected}")]
    KindMismatch {
        expected: ArtifactKind,
        actual: ArtifactKind,
    },
}

/// Summarize a committed artifact.
///
/// Reads the payload named after the kind, or the first file in manifest
/// order when there is none by that name.
pub fn summarize(kind: ArtifactKind, bundle: &ArtifactBundle) -> Result<Summary, SummarizationError> {
    if bundle.manifest.kind != kind {
        return Err(SummarizationError::KindMismatch {
            expected: kind,
            actual: bundle.manifest.kind,
        });
    }
    let document = bundle
        .payload(kind.primary_payload())
        .or_else(|| bundle.ordered_payloads().next().map(|(_, v)| v))
        .ok_or(SummarizationError::MissingPayload { kind })?;

    let mut summary = summarize_payload(kind, document)?;
    summary
        .counts
        .insert("payloadFiles".to_string(), bundle.manifest.files.len() as u64);
    Ok(summary)
}

/// Summarize a single payload document.
pub fn summarize_payload(kind: ArtifactKind, document: &Value) -> Result<Summary, SummarizationError> {
    let summary = match ArtifactPayload::parse(kind, document)? {
        ArtifactPayload::KernelRun(run) => kernel_run(run),
        ArtifactPayload::OrchestratorRun(run) => orchestrator_run(run),
        ArtifactPayload::SessionRecap(recap) => session_recap(recap),
        ArtifactPayload::Bundle(bundle) => bundle_summary(bundle),
        ArtifactPayload::ContactInquiry(inquiry) => contact_inquiry(inquiry),
    };
    Ok(summary)
}

fn kernel_run(run: KernelRunPayload) -> Summary {
    let mut summary = Summary::new(ArtifactKind::KernelRun, SUMMARIZER_VERSION);
    summary.outcome = Some(bound_text(&run.outcome, MAX_TEXT_CHARS));
    summary.confidence = Some(bound_text(&run.confidence, MAX_TEXT_CHARS));

    let supported = run.claims.iter().filter(|c| c.supported == Some(true)).count();
    let unsupported = run.claims.iter().filter(|c| c.supported == Some(false)).count();
    summary.counts.insert("claims".to_string(), run.claims.len() as u64);
    summary.counts.insert("claimsSupported".to_string(), supported as u64);
    summary.counts.insert("claimsUnsupported".to_string(), unsupported as u64);
    summary.counts.insert("traceNodes".to_string(), run.trace.len() as u64);

    // Trace node kinds are the kernel's event stream
    summary.events_by_type = tally(run.trace.iter().map(|n| n.kind.as_str()));

    set_highlights(
        &mut summary,
        run.claims.iter().map(|c| {
            let status = match c.supported {
                Some(true) => "supported",
                Some(false) => "unsupported",
                None => "unknown",
            };
            format!("{}:{}", status, fingerprint(&c.text))
        }),
    );
    summary.excerpt = run.rationale.as_deref().map(|r| bound_text(r, MAX_EXCERPT_CHARS));
    summary
}

fn orchestrator_run(run: OrchestratorRunPayload) -> Summary {
    let mut summary = Summary::new(ArtifactKind::OrchestratorRun, SUMMARIZER_VERSION);
    summary.outcome = Some(bound_text(&run.decision, MAX_TEXT_CHARS));
    summary.confidence = Some(bound_text(&run.confidence, MAX_TEXT_CHARS));

    summary.counts.insert("steps".to_string(), run.steps.len() as u64);
    summary.counts.insert("events".to_string(), run.events.len() as u64);
    summary.events_by_type = event_tally(&run.events);

    set_highlights(
        &mut summary,
        run.steps.iter().map(|s| format!("{}: {}", s.name, s.status)),
    );
    summary
}

fn session_recap(recap: SessionRecapPayload) -> Summary {
    let mut summary = Summary::new(ArtifactKind::SessionRecap, SUMMARIZER_VERSION);
    summary.outcome = recap.outcome.as_deref().map(|o| bound_text(o, MAX_TEXT_CHARS));
    summary.confidence = recap.confidence.as_deref().map(|c| bound_text(c, MAX_TEXT_CHARS));

    summary.counts.insert("events".to_string(), recap.events.len() as u64);
    summary.counts.insert("highlights".to_string(), recap.highlights.len() as u64);
    summary.events_by_type = event_tally(&recap.events);

    set_highlights(&mut summary, recap.highlights.iter().map(|h| fingerprint(h)));
    summary.excerpt = Some(bound_text(&recap.headline, MAX_EXCERPT_CHARS));
    summary
}

fn bundle_summary(bundle: BundlePayload) -> Summary {
    let mut summary = Summary::new(ArtifactKind::Bundle, SUMMARIZER_VERSION);
    summary
        .labels
        .insert("title".to_string(), bound_text(&bundle.title, MAX_TEXT_CHARS));
    summary
        .counts
        .insert("artifactRefs".to_string(), bundle.artifact_refs.len() as u64);

    set_highlights(&mut summary, bundle.artifact_refs.iter().map(String::as_str));
    summary.excerpt = bundle.summary.as_deref().map(|s| bound_text(s, MAX_EXCERPT_CHARS));
    summary
}

fn contact_inquiry(inquiry: ContactInquiryPayload) -> Summary {
    let mut summary = Summary::new(ArtifactKind::ContactInquiry, SUMMARIZER_VERSION);
    summary
        .labels
        .insert("topic".to_string(), bound_text(&inquiry.topic, MAX_TEXT_CHARS));
    summary
        .counts
        .insert("messageChars".to_string(), inquiry.message.chars().count() as u64);
    summary.excerpt = Some(bound_text(&inquiry.message, MAX_EXCERPT_CHARS));
    summary
}

/// Collapse whitespace and cut to `max` characters, ending in `…` when cut.
fn bound_text(text: &str, max: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Short stable digest of free text, insensitive to whitespace layout.
///
/// Claim and recap texts are learner-facing prose; summaries carry only this
/// digest so edits still show up as drift.
fn fingerprint(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let digest = hex::encode(Sha256::digest(collapsed.as_bytes()));
    digest[..FINGERPRINT_HEX_CHARS].to_string()
}

/// Keep the first `MAX_HIGHLIGHTS` items and count the rest.
fn set_highlights<I, S>(summary: &mut Summary, items: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut omitted = 0u64;
    for item in items {
        if summary.highlights.len() < MAX_HIGHLIGHTS {
            summary.highlights.push(bound_text(item.as_ref(), MAX_TEXT_CHARS));
        } else {
            omitted += 1;
        }
    }
    if omitted > 0 {
        summary.counts.insert("highlightsOmitted".to_string(), omitted);
    }
}

fn event_tally(events: &[Event]) -> BTreeMap<String, u64> {
    tally(events.iter().map(|e| e.event_type.as_str()))
}

/// Count occurrences per type. Types beyond the first `MAX_EVENT_TYPES` in
/// sorted order are folded into `other`.
fn tally<'a>(types: impl Iterator<Item = &'a str>) -> BTreeMap<String, u64> {
    let mut all: BTreeMap<String, u64> = BTreeMap::new();
    for t in types {
        *all.entry(bound_text(t, MAX_TEXT_CHARS)).or_insert(0) += 1;
    }
    if all.len() <= MAX_EVENT_TYPES {
        return all;
    }

    let mut kept = BTreeMap::new();
    let mut folded = 0u64;
    for (i, (name, count)) in all.into_iter().enumerate() {
        if i < MAX_EVENT_TYPES && name != OTHER_EVENTS {
            kept.insert(name, count);
        } else {
            folded += count;
        }
    }
    *kept.entry(OTHER_EVENTS.to_string()).or_insert(0) += folded;
    kept
}
