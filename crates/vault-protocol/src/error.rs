//! Stable error codes and redacted boundary errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a message surfaced across the boundary.
pub const MAX_PUBLIC_MESSAGE_CHARS: usize = 200;

/// Error codes surfaced to collaborators.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown kind, malformed identifier, or invalid options.
    ValidationError,
    /// Total payload size is above the configured ceiling.
    SizeExceeded,
    /// Staging or commit failed; prior state is intact.
    WriteFailure,
    /// Stored data could not be read.
    ReadFailure,
    /// Stored hashes do not match stored content.
    Corrupt,
    /// Payload shape does not match its kind.
    SummarizationError,
    /// Golden case references an artifact that does not exist.
    SuiteIntegrityError,
    /// The gate collaborator refused the action.
    Denied,
    /// Caller exceeded its request budget.
    RateLimited,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError => write!(f, "VALIDATION_ERROR"),
            Self::SizeExceeded => write!(f, "SIZE_EXCEEDED"),
            Self::WriteFailure => write!(f, "WRITE_FAILURE"),
            Self::ReadFailure => write!(f, "READ_FAILURE"),
            Self::Corrupt => write!(f, "CORRUPT"),
            Self::SummarizationError => write!(f, "SUMMARIZATION_ERROR"),
            Self::SuiteIntegrityError => write!(f, "SUITE_INTEGRITY_ERROR"),
            Self::Denied => write!(f, "DENIED"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
        }
    }
}

/// Error payload returned across the service boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Single-line message. Never contains filesystem paths, stack traces,
    /// or payload contents.
    pub message: String,
}

impl BoundaryError {
    /// Create a boundary error, redacting and bounding the message.
    pub fn new(code: ErrorCode, message: impl AsRef<str>) -> Self {
        Self {
            code,
            message: redact_message(message.as_ref()),
        }
    }

    pub fn denied(reason: Option<&str>) -> Self {
        match reason {
            Some(r) => Self::new(ErrorCode::Denied, format!("action denied: {}", r)),
            None => Self::new(ErrorCode::Denied, "action denied"),
        }
    }

    pub fn rate_limited() -> Self {
        Self::new(ErrorCode::RateLimited, "too many requests, retry later")
    }
}

impl fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BoundaryError {}

/// Strip path-like tokens, collapse to one line and bound the length.
pub fn redact_message(message: &str) -> String {
    let single_line = message.lines().next().unwrap_or("").trim();
    let redacted: Vec<&str> = single_line
        .split_whitespace()
        .map(|token| if looks_like_path(token) { "[path]" } else { token })
        .collect();
    let joined = redacted.join(" ");

    if joined.chars().count() <= MAX_PUBLIC_MESSAGE_CHARS {
        joined
    } else {
        let mut bounded: String = joined.chars().take(MAX_PUBLIC_MESSAGE_CHARS - 1).collect();
        bounded.push('…');
        bounded
    }
}

fn looks_like_path(token: &str) -> bool {
    let t = token.trim_matches(|c: char| matches!(c, '\'' | '"' | '(' | ')' | ',' | ':' | ';'));
    t.starts_with('/')
        || t.starts_with("./")
        || t.starts_with("../")
        || t.starts_with("~/")
        || t.contains(":\\")
        || t.matches('/').count() >= 2
}
