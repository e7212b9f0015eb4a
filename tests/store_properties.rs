//! Artifact store properties
//!
//! Round trips on the filesystem backend, all-or-nothing publishing under
//! injected failures and concurrent readers, hash integrity, list bounds and
//! orphan sweeping.

mod fixtures;

use std::fs;
use std::io;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;

use artifact_vault::{
    ArtifactKind, ArtifactStore, ListFilter, Payload, PutOptions, StoreConfig,
};
use fixtures::{fs_store, payload_doc, primary_payload, put_fixture};
use serde_json::json;
use tempfile::TempDir;
use vault_store::{FsBackend, IntegrityProblem, PublishBackend, StoreError};

/// Filesystem backend whose stage and commit steps can be made to fail
#[derive(Debug)]
struct FlakyBackend {
    inner: FsBackend,
    fail_stage: AtomicBool,
    fail_commit: AtomicBool,
}

impl FlakyBackend {
    fn open(root: &std::path::Path) -> Self {
        Self {
            inner: FsBackend::open(root).unwrap(),
            fail_stage: AtomicBool::new(false),
            fail_commit: AtomicBool::new(false),
        }
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {} failure", what))
}

impl PublishBackend for FlakyBackend {
    fn stage_object(&self, artifact_id: &str, relative_path: &str, bytes: &[u8]) -> io::Result<()> {
        // Write first so the abandoned generation really exists on disk
        self.inner.stage_object(artifact_id, relative_path, bytes)?;
        if self.fail_stage.load(Ordering::SeqCst) {
            return Err(injected("stage"));
        }
        Ok(())
    }

    fn commit_manifest(&self, artifact_id: &str, manifest: &[u8]) -> io::Result<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(injected("commit"));
        }
        self.inner.commit_manifest(artifact_id, manifest)
    }

    fn read_manifest(&self, artifact_id: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read_manifest(artifact_id)
    }

    fn read_object(&self, artifact_id: &str, relative_path: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read_object(artifact_id, relative_path)
    }

    fn manifest_exists(&self, artifact_id: &str) -> io::Result<bool> {
        self.inner.manifest_exists(artifact_id)
    }

    fn manifest_ids(&self) -> io::Result<Vec<String>> {
        self.inner.manifest_ids()
    }

    fn remove_manifest(&self, artifact_id: &str) -> io::Result<bool> {
        self.inner.remove_manifest(artifact_id)
    }

    fn discard_generation(&self, artifact_id: &str, generation: &str) -> io::Result<()> {
        self.inner.discard_generation(artifact_id, generation)
    }

    fn generations(&self, artifact_id: &str) -> io::Result<Vec<String>> {
        self.inner.generations(artifact_id)
    }

    fn object_ids(&self) -> io::Result<Vec<String>> {
        self.inner.object_ids()
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Filesystem backend that runs a one-shot callback at the start of a call,
/// standing in for a writer that lands between two steps of the store
struct InterleavedBackend {
    inner: FsBackend,
    before_generations: Mutex<Option<Hook>>,
    before_remove_manifest: Mutex<Option<Hook>>,
}

impl InterleavedBackend {
    fn open(root: &std::path::Path) -> Self {
        Self {
            inner: FsBackend::open(root).unwrap(),
            before_generations: Mutex::new(None),
            before_remove_manifest: Mutex::new(None),
        }
    }

    fn fire(slot: &Mutex<Option<Hook>>) {
        let hook = slot.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl fmt::Debug for InterleavedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterleavedBackend")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl PublishBackend for InterleavedBackend {
    fn stage_object(&self, artifact_id: &str, relative_path: &str, bytes: &[u8]) -> io::Result<()> {
        self.inner.stage_object(artifact_id, relative_path, bytes)
    }

    fn commit_manifest(&self, artifact_id: &str, manifest: &[u8]) -> io::Result<()> {
        self.inner.commit_manifest(artifact_id, manifest)
    }

    fn read_manifest(&self, artifact_id: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read_manifest(artifact_id)
    }

    fn read_object(&self, artifact_id: &str, relative_path: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read_object(artifact_id, relative_path)
    }

    fn manifest_exists(&self, artifact_id: &str) -> io::Result<bool> {
        self.inner.manifest_exists(artifact_id)
    }

    fn manifest_ids(&self) -> io::Result<Vec<String>> {
        self.inner.manifest_ids()
    }

    fn remove_manifest(&self, artifact_id: &str) -> io::Result<bool> {
        Self::fire(&self.before_remove_manifest);
        self.inner.remove_manifest(artifact_id)
    }

    fn discard_generation(&self, artifact_id: &str, generation: &str) -> io::Result<()> {
        self.inner.discard_generation(artifact_id, generation)
    }

    fn generations(&self, artifact_id: &str) -> io::Result<Vec<String>> {
        Self::fire(&self.before_generations);
        self.inner.generations(artifact_id)
    }

    fn object_ids(&self) -> io::Result<Vec<String>> {
        self.inner.object_ids()
    }
}

/// A hook that replaces `kr-1` with `version` through the store under test
fn replace_with(store: &Arc<ArtifactStore>, version: u64) -> Hook {
    let store: Weak<ArtifactStore> = Arc::downgrade(store);
    Box::new(move || {
        let store = store.upgrade().unwrap();
        store
            .put(ArtifactKind::KernelRun, versioned(version), PutOptions::with_id("kr-1"))
            .unwrap();
    })
}

fn versioned(version: u64) -> Vec<Payload> {
    vec![
        Payload::new("kernel_run", json!({"outcome": "S1", "version": version})),
        Payload::new("trace", json!({"version": version, "nodes": [1, 2, 3]})),
    ]
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_round_trip_every_kind_on_disk() {
    let (_dir, store) = fs_store();
    let kinds = [
        (ArtifactKind::KernelRun, "kr-1"),
        (ArtifactKind::OrchestratorRun, "orch-1"),
        (ArtifactKind::SessionRecap, "recap-1"),
        (ArtifactKind::Bundle, "bundle-1"),
        (ArtifactKind::ContactInquiry, "contact-1"),
    ];

    for (kind, id) in kinds {
        put_fixture(&store, kind, id);
        let bundle = store.get(id).unwrap().unwrap();
        assert_eq!(bundle.manifest.kind, kind);
        assert_eq!(bundle.payload(kind.primary_payload()), Some(&payload_doc(kind)));
        assert!(store.exists(id).unwrap());
        assert!(store.verify(id).unwrap().unwrap().passed());
    }
}

#[test]
fn test_round_trip_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = ArtifactStore::open(dir.path(), StoreConfig::default()).unwrap();
        put_fixture(&store, ArtifactKind::KernelRun, "kr-1");
    }
    let store = ArtifactStore::open(dir.path(), StoreConfig::default()).unwrap();
    let bundle = store.get("kr-1").unwrap().unwrap();
    assert_eq!(
        bundle.payload("kernel_run"),
        Some(&payload_doc(ArtifactKind::KernelRun))
    );
}

#[test]
fn test_floats_and_unicode_survive() {
    let (_dir, store) = fs_store();
    let doc = json!({"outcome": "S2", "score": 0.1, "ratio": 1e-7, "note": "naïve café ✓"});
    store
        .put(
            ArtifactKind::KernelRun,
            primary_payload(ArtifactKind::KernelRun, doc.clone()),
            PutOptions::with_id("kr-float"),
        )
        .unwrap();
    let bundle = store.get("kr-float").unwrap().unwrap();
    assert_eq!(bundle.payload("kernel_run"), Some(&doc));
}

// =============================================================================
// Atomic Publish
// =============================================================================

#[test]
fn test_failed_commit_keeps_prior_version() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FlakyBackend::open(dir.path()));
    let store = ArtifactStore::with_backend(backend.clone(), StoreConfig::default());

    store
        .put(ArtifactKind::KernelRun, versioned(1), PutOptions::with_id("kr-1"))
        .unwrap();

    backend.fail_commit.store(true, Ordering::SeqCst);
    let err = store
        .put(ArtifactKind::KernelRun, versioned(2), PutOptions::with_id("kr-1"))
        .unwrap_err();
    assert!(matches!(err, StoreError::WriteFailure(_)));

    let bundle = store.get("kr-1").unwrap().unwrap();
    assert_eq!(bundle.payload("kernel_run").unwrap()["version"], 1);
    assert_eq!(bundle.payload("trace").unwrap()["version"], 1);
    assert_eq!(backend.generations("kr-1").unwrap().len(), 1);
    assert!(store.verify("kr-1").unwrap().unwrap().passed());
}

#[test]
fn test_failed_stage_leaves_nothing_behind() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FlakyBackend::open(dir.path()));
    let store = ArtifactStore::with_backend(backend.clone(), StoreConfig::default());

    backend.fail_stage.store(true, Ordering::SeqCst);
    assert!(store
        .put(ArtifactKind::KernelRun, versioned(1), PutOptions::with_id("kr-new"))
        .is_err());

    assert!(!store.exists("kr-new").unwrap());
    assert!(store.get("kr-new").unwrap().is_none());
    assert!(backend.generations("kr-new").unwrap().is_empty());
}

#[test]
fn test_replace_discards_superseded_generation() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FsBackend::open(dir.path()).unwrap());
    let store = ArtifactStore::with_backend(backend.clone(), StoreConfig::default());

    for version in 1..=3 {
        store
            .put(ArtifactKind::KernelRun, versioned(version), PutOptions::with_id("kr-1"))
            .unwrap();
    }
    assert_eq!(backend.generations("kr-1").unwrap().len(), 1);
    let bundle = store.get("kr-1").unwrap().unwrap();
    assert_eq!(bundle.payload("trace").unwrap()["version"], 3);
}

#[test]
fn test_concurrent_reader_never_sees_a_mix() {
    let (_dir, store) = fs_store();
    store
        .put(ArtifactKind::KernelRun, versioned(0), PutOptions::with_id("shared"))
        .unwrap();

    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = store.clone();
        let done = done.clone();
        thread::spawn(move || {
            for version in 1..=150 {
                store
                    .put(ArtifactKind::KernelRun, versioned(version), PutOptions::with_id("shared"))
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let reader = {
        let store = store.clone();
        let done = done.clone();
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                match store.get("shared") {
                    Ok(Some(bundle)) => {
                        let a = &bundle.payload("kernel_run").unwrap()["version"];
                        let b = &bundle.payload("trace").unwrap()["version"];
                        assert_eq!(a, b, "reader observed payloads from two versions");
                    }
                    Ok(None) => panic!("artifact disappeared during replacement"),
                    // Heavy churn may exhaust read retries; that is never corruption
                    Err(StoreError::ReadFailure(_)) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    let bundle = store.get("shared").unwrap().unwrap();
    assert_eq!(bundle.payload("kernel_run").unwrap()["version"], 150);
}

// =============================================================================
// Hash Integrity
// =============================================================================

#[test]
fn test_tampered_payload_is_detected() {
    let (dir, store) = fs_store();
    store
        .put(ArtifactKind::KernelRun, versioned(1), PutOptions::with_id("kr-1"))
        .unwrap();

    let manifest = store.manifest("kr-1").unwrap().unwrap();
    let entry = manifest.file("trace").unwrap();
    let object = dir
        .path()
        .join("objects")
        .join("kr-1")
        .join(&entry.relative_path);
    let original = fs::read_to_string(&object).unwrap();
    // Same length, different content
    fs::write(&object, original.replace("\"version\":1", "\"version\":7")).unwrap();

    let err = store.get("kr-1").unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));

    let report = store.verify("kr-1").unwrap().unwrap();
    assert!(!report.passed());
    assert_eq!(report.problems.len(), 1);
    assert!(matches!(
        &report.problems[0],
        IntegrityProblem::HashMismatch { name, .. } if name == "trace"
    ));
}

#[test]
fn test_missing_payload_is_reported() {
    let (dir, store) = fs_store();
    store
        .put(ArtifactKind::KernelRun, versioned(1), PutOptions::with_id("kr-1"))
        .unwrap();

    let manifest = store.manifest("kr-1").unwrap().unwrap();
    let entry = manifest.file("kernel_run").unwrap();
    fs::remove_file(dir.path().join("objects/kr-1").join(&entry.relative_path)).unwrap();

    assert!(matches!(
        store.get("kr-1").unwrap_err(),
        StoreError::Corrupt { .. }
    ));
    let report = store.verify("kr-1").unwrap().unwrap();
    assert!(matches!(
        &report.problems[0],
        IntegrityProblem::MissingFile { name } if name == "kernel_run"
    ));
}

#[test]
fn test_root_hash_is_stable_for_equal_content() {
    let (_dir, store) = fs_store();
    // Key order differs; canonical hashing makes it irrelevant
    let a = store
        .put(
            ArtifactKind::KernelRun,
            vec![Payload::new("kernel_run", json!({"outcome": "S1", "confidence": "High"}))],
            PutOptions::with_id("kr-a"),
        )
        .unwrap();
    let b = store
        .put(
            ArtifactKind::KernelRun,
            vec![Payload::new(
                "kernel_run",
                serde_json::from_str(r#"{"confidence":"High","outcome":"S1"}"#).unwrap(),
            )],
            PutOptions::with_id("kr-b"),
        )
        .unwrap();
    assert_eq!(a.manifest.root_sha256, b.manifest.root_sha256);
    assert_eq!(a.manifest.files[0].sha256, b.manifest.files[0].sha256);
}

// =============================================================================
// Limits
// =============================================================================

#[test]
fn test_list_never_exceeds_fifty() {
    let (_dir, store) = fs_store();
    for i in 0..60 {
        store
            .put(
                ArtifactKind::SessionRecap,
                vec![Payload::new("session_recap", json!({"headline": format!("recap {}", i)}))],
                PutOptions::with_id(format!("recap-{:02}", i)),
            )
            .unwrap();
    }

    let all = store.list(&ListFilter::default()).unwrap();
    assert_eq!(all.len(), 50);

    let asked = store
        .list(&ListFilter {
            limit: Some(500),
            ..ListFilter::default()
        })
        .unwrap();
    assert_eq!(asked.len(), 50);

    for pair in all.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[test]
fn test_list_filters_combine() {
    let (_dir, store) = fs_store();
    let put = |id: &str, kind: ArtifactKind, tags: &[&str], learner: &str| {
        store
            .put(
                kind,
                vec![Payload::new(kind.primary_payload(), json!({"n": id}))],
                PutOptions {
                    artifact_id: Some(id.to_string()),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    learner_id: Some(learner.to_string()),
                    ..PutOptions::default()
                },
            )
            .unwrap();
    };
    put("a", ArtifactKind::KernelRun, &["week-1"], "l1");
    put("b", ArtifactKind::KernelRun, &["week-2"], "l1");
    put("c", ArtifactKind::KernelRun, &["week-3"], "l1");
    put("d", ArtifactKind::Bundle, &["week-1"], "l1");
    put("e", ArtifactKind::KernelRun, &["week-1"], "l2");

    let mut ids: Vec<String> = store
        .list(&ListFilter {
            kind: Some(ArtifactKind::KernelRun),
            tags: vec!["week-1".into(), "week-2".into()],
            learner_id: Some("l1".into()),
            limit: None,
        })
        .unwrap()
        .into_iter()
        .map(|m| m.artifact_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn test_oversized_put_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::open(
        dir.path(),
        StoreConfig {
            max_artifact_bytes: 64,
            ..StoreConfig::default()
        },
    )
    .unwrap();

    let err = store
        .put(
            ArtifactKind::Bundle,
            vec![Payload::new("bundle", json!({"summary": "x".repeat(200)}))],
            PutOptions::with_id("big"),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::SizeExceeded { limit: 64, .. }));
    assert!(!store.exists("big").unwrap());
    assert!(!dir.path().join("manifests/big.json").exists());
    assert!(!dir.path().join("objects/big").exists());
}

#[test]
fn test_invalid_ids_are_rejected_or_absent() {
    let (_dir, store) = fs_store();
    for id in ["", "../escape", "has space", "a/b"] {
        let err = store
            .put(
                ArtifactKind::KernelRun,
                versioned(1),
                PutOptions::with_id(id),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "id {:?}", id);
        assert!(store.get(id).unwrap().is_none());
        assert!(!store.delete(id).unwrap());
    }
}

// =============================================================================
// Delete and Sweep
// =============================================================================

#[test]
fn test_delete_removes_manifest_and_payloads() {
    let (dir, store) = fs_store();
    put_fixture(&store, ArtifactKind::KernelRun, "kr-1");

    assert!(store.delete("kr-1").unwrap());
    assert!(!store.exists("kr-1").unwrap());
    assert!(store.get("kr-1").unwrap().is_none());
    assert!(!store.delete("kr-1").unwrap());

    let leftovers = fs::read_dir(dir.path().join("objects"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name() == "kr-1")
        .filter(|e| fs::read_dir(e.path()).map(|mut d| d.next().is_some()).unwrap_or(false))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_sweep_removes_orphaned_generations() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FlakyBackend::open(dir.path()));
    let store = ArtifactStore::with_backend(backend.clone(), StoreConfig::default());

    store
        .put(ArtifactKind::KernelRun, versioned(1), PutOptions::with_id("kr-1"))
        .unwrap();

    // Simulate a crash between staging and commit
    backend
        .inner
        .stage_object("kr-1", "01orphan/kernel_run.json", b"{}")
        .unwrap();
    backend
        .inner
        .stage_object("ghost", "01orphan/kernel_run.json", b"{}")
        .unwrap();

    let report = store.sweep_orphans().unwrap();
    assert_eq!(report.generations_removed, 2);
    assert!(report.errors.is_empty());

    assert_eq!(backend.generations("kr-1").unwrap().len(), 1);
    assert!(backend.generations("ghost").unwrap().is_empty());
    assert!(store.get("kr-1").unwrap().is_some());

    // Nothing left to sweep
    assert_eq!(store.sweep_orphans().unwrap().generations_removed, 0);
}

#[test]
fn test_sweep_keeps_generation_committed_while_sweeping() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(InterleavedBackend::open(dir.path()));
    let store = Arc::new(ArtifactStore::with_backend(backend.clone(), StoreConfig::default()));

    store
        .put(ArtifactKind::KernelRun, versioned(1), PutOptions::with_id("kr-1"))
        .unwrap();

    // A replacement commits just before the sweep lists kr-1's generations
    *backend.before_generations.lock().unwrap() = Some(replace_with(&store, 2));

    let report = store.sweep_orphans().unwrap();
    assert_eq!(report.generations_removed, 0);
    assert!(report.errors.is_empty());

    let bundle = store.get("kr-1").unwrap().unwrap();
    assert_eq!(bundle.payload("kernel_run").unwrap()["version"], 2);
    assert_eq!(bundle.payload("trace").unwrap()["version"], 2);
    assert!(store.verify("kr-1").unwrap().unwrap().passed());
    assert_eq!(backend.inner.generations("kr-1").unwrap().len(), 1);
}

#[test]
fn test_delete_leaves_no_payloads_after_concurrent_replace() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(InterleavedBackend::open(dir.path()));
    let store = Arc::new(ArtifactStore::with_backend(backend.clone(), StoreConfig::default()));

    store
        .put(ArtifactKind::KernelRun, versioned(1), PutOptions::with_id("kr-1"))
        .unwrap();

    // A replacement commits between reading kr-1 and removing its manifest
    *backend.before_remove_manifest.lock().unwrap() = Some(replace_with(&store, 2));

    assert!(store.delete("kr-1").unwrap());
    assert!(!store.exists("kr-1").unwrap());
    assert!(store.get("kr-1").unwrap().is_none());
    assert!(backend.inner.generations("kr-1").unwrap().is_empty());
    assert_eq!(store.sweep_orphans().unwrap().generations_removed, 0);
}
