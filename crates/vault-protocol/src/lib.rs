//! Artifact Vault Protocol Types
//!
//! Defines the persisted manifest record, the per-kind summary shape, and the
//! diff/suite reports shared by the store, the summarizer and the harness.

pub mod error;
pub mod golden;
pub mod kind;
pub mod manifest;
pub mod report;
pub mod summary;

pub use error::{BoundaryError, ErrorCode};
pub use golden::GoldenCase;
pub use kind::{ArtifactKind, UnknownKind};
pub use manifest::{ArtifactBundle, ArtifactManifest, FileEntry, CONTRACT_VERSION};
pub use report::{DiffEntry, DiffReport, Severity, SuiteReport};
pub use summary::Summary;

/// Hard upper bound on manifests returned by a single `list` call.
pub const LIST_HARD_CAP: usize = 50;

/// Maximum golden case label length in characters.
pub const MAX_LABEL_CHARS: usize = 60;
