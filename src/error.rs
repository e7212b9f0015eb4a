//! Vault-level error type.

use std::io;

use thiserror::Error;
use vault_protocol::{BoundaryError, ErrorCode};
use vault_store::StoreError;
use vault_summarizer::SummarizationError;

use crate::config::ConfigError;

/// Errors surfaced by vault operations.
///
/// Absence is not an error: lookups return `Ok(None)` or `false`.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("payload size {size} bytes exceeds ceiling of {limit} bytes")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("write failure: {0}")]
    WriteFailure(String),

    #[error("read failure: {0}")]
    ReadFailure(String),

    #[error("artifact {artifact_id} is corrupt: {detail}")]
    Corrupt { artifact_id: String, detail: String },

    #[error("summarization error: {0}")]
    Summarization(#[from] SummarizationError),

    #[error("suite integrity error: {0}")]
    SuiteIntegrity(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type VaultResult<T> = Result<T, VaultError>;

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => VaultError::Validation(msg),
            StoreError::SizeExceeded { size, limit } => VaultError::SizeExceeded { size, limit },
            StoreError::WriteFailure(msg) => VaultError::WriteFailure(msg),
            StoreError::Corrupt { artifact_id, detail } => VaultError::Corrupt { artifact_id, detail },
            StoreError::Canonicalization(msg) => VaultError::Validation(msg),
            other @ (StoreError::ReadFailure(_) | StoreError::Json(_)) => {
                VaultError::ReadFailure(other.to_string())
            }
        }
    }
}

impl From<io::Error> for VaultError {
    fn from(err: io::Error) -> Self {
        VaultError::ReadFailure(err.to_string())
    }
}

impl VaultError {
    /// Stable error code
    pub fn code(&self) -> ErrorCode {
        match self {
            VaultError::Validation(_) | VaultError::Config(_) => ErrorCode::ValidationError,
            VaultError::SizeExceeded { .. } => ErrorCode::SizeExceeded,
            VaultError::WriteFailure(_) => ErrorCode::WriteFailure,
            VaultError::ReadFailure(_) => ErrorCode::ReadFailure,
            VaultError::Corrupt { .. } => ErrorCode::Corrupt,
            VaultError::Summarization(_) => ErrorCode::SummarizationError,
            VaultError::SuiteIntegrity(_) => ErrorCode::SuiteIntegrityError,
        }
    }

    /// Redacted public form
    pub fn to_boundary(&self) -> BoundaryError {
        BoundaryError::new(self.code(), self.to_string())
    }

    /// CLI exit status: 2 for usage/config problems, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            VaultError::Validation(_) | VaultError::Config(_) => 2,
            _ => 1,
        }
    }
}
