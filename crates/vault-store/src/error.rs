//! Store error taxonomy.

use std::io;

use thiserror::Error;
use vault_protocol::{BoundaryError, ErrorCode};

/// Errors from artifact store operations.
///
/// Absence is never an error: `get` returns `Ok(None)` and `delete`/`exists`
/// return `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("payload size {size} bytes exceeds ceiling of {limit} bytes")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("write failure: {0}")]
    WriteFailure(String),

    #[error("read failure: {0}")]
    ReadFailure(#[from] io::Error),

    #[error("artifact {artifact_id} is corrupt: {detail}")]
    Corrupt { artifact_id: String, detail: String },

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn write(context: &str, err: io::Error) -> Self {
        StoreError::WriteFailure(format!("{}: {}", context, err))
    }

    pub(crate) fn corrupt(artifact_id: &str, detail: impl Into<String>) -> Self {
        StoreError::Corrupt {
            artifact_id: artifact_id.to_string(),
            detail: detail.into(),
        }
    }

    /// Stable error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Validation(_) => ErrorCode::ValidationError,
            StoreError::SizeExceeded { .. } => ErrorCode::SizeExceeded,
            StoreError::WriteFailure(_) => ErrorCode::WriteFailure,
            StoreError::ReadFailure(_) | StoreError::Json(_) => ErrorCode::ReadFailure,
            StoreError::Corrupt { .. } => ErrorCode::Corrupt,
            StoreError::Canonicalization(_) => ErrorCode::ValidationError,
        }
    }

    /// Redacted form suitable for callers outside the process
    pub fn to_boundary(&self) -> BoundaryError {
        BoundaryError::new(self.code(), self.to_string())
    }
}
