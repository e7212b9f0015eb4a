//! Shared fixtures for vault integration tests
//!
//! Payload documents live under `tests/fixtures/payloads/`, one per kind.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use artifact_vault::{ArtifactKind, ArtifactStore, Payload, PutOptions, StoreConfig};
use serde_json::Value;
use tempfile::TempDir;

/// Directory holding the payload fixtures
pub fn payloads_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/payloads")
}

/// Load the fixture payload for a kind
pub fn payload_doc(kind: ArtifactKind) -> Value {
    let path = payloads_dir().join(format!("{}.json", kind.primary_payload()));
    let json = std::fs::read_to_string(&path).unwrap();
    serde_json::from_str(&json).unwrap()
}

/// Fixture payload wrapped under the kind's primary payload name
pub fn primary_payload(kind: ArtifactKind, doc: Value) -> Vec<Payload> {
    vec![Payload::new(kind.primary_payload(), doc)]
}

/// Filesystem store in a fresh temp directory
pub fn fs_store() -> (TempDir, Arc<ArtifactStore>) {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::open(dir.path(), StoreConfig::default()).unwrap();
    (dir, Arc::new(store))
}

/// Put the fixture payload of `kind` under `id`
pub fn put_fixture(store: &ArtifactStore, kind: ArtifactKind, id: &str) {
    store
        .put(kind, primary_payload(kind, payload_doc(kind)), PutOptions::with_id(id))
        .unwrap();
}
