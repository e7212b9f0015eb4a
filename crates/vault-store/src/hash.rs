//! Content hashing with JCS canonicalization.
//!
//! Payload documents are hashed over their RFC 8785 canonical form, so two
//! documents with the same content hash identically no matter how their maps
//! were built.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use vault_protocol::{ArtifactManifest, FileEntry};

use crate::error::{StoreError, StoreResult};

/// Compute SHA-256 of bytes and return lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Canonical (JCS) serialization of a document
pub fn canonical_bytes(value: &Value) -> StoreResult<Vec<u8>> {
    serde_json_canonicalizer::to_vec(value).map_err(|e| StoreError::Canonicalization(e.to_string()))
}

/// SHA-256 of the canonical serialization of a document
pub fn content_sha256(value: &Value) -> StoreResult<String> {
    Ok(sha256_hex(&canonical_bytes(value)?))
}

/// The part of a file entry bound by the root hash
#[derive(Serialize)]
struct RootPair<'a> {
    name: &'a str,
    sha256: &'a str,
}

/// Compute `rootSha256` over the ordered `(name, sha256)` pairs
pub fn compute_root_sha256(files: &[FileEntry]) -> StoreResult<String> {
    let pairs: Vec<RootPair<'_>> = files
        .iter()
        .map(|f| RootPair {
            name: &f.name,
            sha256: &f.sha256,
        })
        .collect();
    let jcs_bytes = serde_json_canonicalizer::to_vec(&pairs)
        .map_err(|e| StoreError::Canonicalization(e.to_string()))?;
    Ok(sha256_hex(&jcs_bytes))
}

/// Whether the manifest's stored root hash matches its file list
pub fn verify_root(manifest: &ArtifactManifest) -> StoreResult<bool> {
    Ok(compute_root_sha256(&manifest.files)? == manifest.root_sha256)
}
