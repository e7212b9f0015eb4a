//! Input validation for identifiers and put options.
//!
//! Identifiers end up in storage paths, so they must be filesystem-safe:
//! `^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$`.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::{StoreError, StoreResult};

/// Maximum number of tags on one artifact
pub(crate) const MAX_TAGS: usize = 16;

/// Maximum characters in a single tag
pub(crate) const MAX_TAG_CHARS: usize = 64;

/// Maximum characters in learner/session identifiers
pub(crate) const MAX_REF_CHARS: usize = 128;

/// Notes beyond this length are truncated with a warning
pub(crate) const MAX_NOTES_CHARS: usize = 2000;

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("static regex"))
}

/// Validate an artifact identifier
pub fn validate_artifact_id(id: &str) -> StoreResult<()> {
    if identifier_regex().is_match(id) {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "artifact id '{}' must match [A-Za-z0-9][A-Za-z0-9_-]{{0,63}}",
            truncate_for_message(id)
        )))
    }
}

/// Validate a payload name
pub(crate) fn validate_payload_name(name: &str) -> StoreResult<()> {
    if identifier_regex().is_match(name) {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "payload name '{}' must match [A-Za-z0-9][A-Za-z0-9_-]{{0,63}}",
            truncate_for_message(name)
        )))
    }
}

/// Normalize tags: trim, reject empty/oversized, drop duplicates (first wins).
///
/// Returns the normalized tags plus warnings for anything dropped.
pub(crate) fn normalize_tags(tags: &[String]) -> StoreResult<(Vec<String>, Vec<String>)> {
    let mut normalized: Vec<String> = Vec::new();
    let mut warnings = Vec::new();

    for raw in tags {
        let tag = raw.trim();
        if tag.is_empty() {
            return Err(StoreError::Validation("tags must not be empty".to_string()));
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(StoreError::Validation(format!(
                "tag '{}' exceeds {} characters",
                truncate_for_message(tag),
                MAX_TAG_CHARS
            )));
        }
        if normalized.iter().any(|t| t == tag) {
            warnings.push(format!("duplicate tag '{}' ignored", tag));
            continue;
        }
        normalized.push(tag.to_string());
    }

    if normalized.len() > MAX_TAGS {
        return Err(StoreError::Validation(format!(
            "at most {} tags are allowed, got {}",
            MAX_TAGS,
            normalized.len()
        )));
    }

    Ok((normalized, warnings))
}

/// Validate an optional learner/session reference
pub(crate) fn validate_reference(field: &str, value: Option<&str>) -> StoreResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) => {
            let v = v.trim();
            if v.is_empty() {
                Err(StoreError::Validation(format!("{} must not be empty", field)))
            } else if v.chars().count() > MAX_REF_CHARS {
                Err(StoreError::Validation(format!(
                    "{} exceeds {} characters",
                    field, MAX_REF_CHARS
                )))
            } else {
                Ok(Some(v.to_string()))
            }
        }
    }
}

/// Bound free-text notes, returning a warning when truncated
pub(crate) fn bound_notes(notes: Option<&str>) -> (Option<String>, Option<String>) {
    match notes {
        None => (None, None),
        Some(n) if n.chars().count() <= MAX_NOTES_CHARS => (Some(n.to_string()), None),
        Some(n) => (
            Some(n.chars().take(MAX_NOTES_CHARS).collect()),
            Some(format!("notes truncated to {} characters", MAX_NOTES_CHARS)),
        ),
    }
}

fn truncate_for_message(s: &str) -> String {
    s.chars().take(32).collect()
}
