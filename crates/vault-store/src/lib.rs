//! Content-addressed artifact store.
//!
//! Payload documents are staged under a fresh generation, hashed with a
//! canonical (JCS) serialization, and made visible by committing the manifest
//! record last. Readers only resolve payloads through a committed manifest.

pub mod error;
pub mod hash;
pub mod publish;
pub mod store;
mod validate;

pub use error::{StoreError, StoreResult};
pub use hash::{canonical_bytes, compute_root_sha256, content_sha256, sha256_hex, verify_root};
pub use publish::{FsBackend, MemoryBackend, PublishBackend};
pub use store::{
    ArtifactStore, IntegrityProblem, ListFilter, Payload, PutOptions, PutOutcome, StoreConfig,
    SweepReport, VerificationReport, DEFAULT_MAX_ARTIFACT_BYTES,
};
pub use validate::validate_artifact_id;
