//! Artifact store: put/get/list/delete/exists over manifests and payloads.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vault_protocol::{
    ArtifactBundle, ArtifactKind, ArtifactManifest, FileEntry, CONTRACT_VERSION, LIST_HARD_CAP,
};

use crate::error::{StoreError, StoreResult};
use crate::hash::{compute_root_sha256, content_sha256, sha256_hex};
use crate::publish::{FsBackend, MemoryBackend, PublishBackend};
use crate::validate::{
    bound_notes, normalize_tags, validate_artifact_id, validate_payload_name, validate_reference,
};

/// Default per-artifact payload ceiling (512 KiB)
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 512 * 1024;

/// How many times `get` re-resolves the manifest when it races a replacement
const READ_ATTEMPTS: usize = 3;

/// Temp files younger than this are assumed to belong to an in-flight commit
const TEMP_GRACE: Duration = Duration::from_secs(3600);

/// Store limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Total serialized payload bytes allowed per artifact
    pub max_artifact_bytes: u64,
    /// Default `list` size; never above the hard cap of 50
    pub list_cap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            list_cap: LIST_HARD_CAP,
        }
    }
}

/// A named payload document to store
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub name: String,
    pub document: Value,
}

impl Payload {
    pub fn new(name: impl Into<String>, document: Value) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }
}

/// Optional metadata for `put`
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Caller-assigned id; a ULID is generated when absent
    pub artifact_id: Option<String>,
    pub tags: Vec<String>,
    pub learner_id: Option<String>,
    pub session_id: Option<String>,
    pub notes: Option<String>,
}

impl PutOptions {
    pub fn with_id(artifact_id: impl Into<String>) -> Self {
        Self {
            artifact_id: Some(artifact_id.into()),
            ..Self::default()
        }
    }
}

/// Result of a committed `put`
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub artifact_id: String,
    pub manifest: ArtifactManifest,
    /// Non-fatal failures after commit (e.g. superseded objects not cleaned up)
    pub errors: Vec<String>,
    /// Input normalizations applied before commit
    pub warnings: Vec<String>,
}

/// Filter for `list`
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub kind: Option<ArtifactKind>,
    /// Matches manifests carrying any of these tags
    pub tags: Vec<String>,
    pub learner_id: Option<String>,
    pub limit: Option<usize>,
}

impl ListFilter {
    fn matches(&self, manifest: &ArtifactManifest) -> bool {
        if let Some(kind) = self.kind {
            if manifest.kind != kind {
                return false;
            }
        }
        if !self.tags.is_empty() && !manifest.has_any_tag(&self.tags) {
            return false;
        }
        if let Some(ref learner) = self.learner_id {
            if manifest.learner_id.as_deref() != Some(learner.as_str()) {
                return false;
            }
        }
        true
    }
}

/// One integrity problem found by `verify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityProblem {
    RootHashMismatch { expected: String, actual: String },
    MissingFile { name: String },
    SizeMismatch { name: String, expected: u64, actual: u64 },
    HashMismatch { name: String, expected: String, actual: String },
    Unparseable { name: String },
}

/// Result of verifying one artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub artifact_id: String,
    pub files_checked: usize,
    pub problems: Vec<IntegrityProblem>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Result of `sweep_orphans`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub generations_removed: usize,
    pub temp_files_removed: usize,
    /// Non-fatal errors encountered
    pub errors: Vec<String>,
}

/// Content-addressed artifact store.
///
/// Thread-safe; puts to different ids never wait on each other. The only
/// shared state is the set of generations currently being staged, which keeps
/// `sweep_orphans` from reclaiming an in-flight put.
#[derive(Debug)]
pub struct ArtifactStore {
    backend: Arc<dyn PublishBackend>,
    config: StoreConfig,
    staging: Mutex<HashSet<String>>,
}

/// Removes a generation from the staging set when the put finishes
struct StagingGuard<'a> {
    staging: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.staging.lock() {
            set.remove(&self.key);
        }
    }
}

fn generation_of(relative_path: &str) -> Option<&str> {
    relative_path.split_once('/').map(|(generation, _)| generation)
}

fn manifest_generations(manifest: &ArtifactManifest) -> BTreeSet<String> {
    manifest
        .files
        .iter()
        .filter_map(|f| generation_of(&f.relative_path).map(str::to_string))
        .collect()
}

fn staging_key(artifact_id: &str, generation: &str) -> String {
    format!("{}/{}", artifact_id, generation)
}

impl ArtifactStore {
    /// Open a filesystem-backed store at `root`
    pub fn open(root: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let backend = FsBackend::open(root).map_err(|e| StoreError::write("opening store", e))?;
        Ok(Self::with_backend(Arc::new(backend), config))
    }

    /// Store kept entirely in memory
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), config)
    }

    pub fn with_backend(backend: Arc<dyn PublishBackend>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            staging: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Store an artifact atomically.
    ///
    /// Validation and the size ceiling are checked before anything is written.
    /// Re-putting an existing id replaces manifest and payloads as one unit.
    pub fn put(
        &self,
        kind: ArtifactKind,
        payloads: Vec<Payload>,
        options: PutOptions,
    ) -> StoreResult<PutOutcome> {
        let mut warnings = Vec::new();

        let artifact_id = match options.artifact_id {
            Some(id) => {
                validate_artifact_id(&id)?;
                id
            }
            None => ulid::Ulid::new().to_string().to_lowercase(),
        };

        if payloads.is_empty() {
            return Err(StoreError::Validation(
                "an artifact needs at least one payload".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for payload in &payloads {
            validate_payload_name(&payload.name)?;
            if !seen.insert(payload.name.as_str()) {
                return Err(StoreError::Validation(format!(
                    "duplicate payload name '{}'",
                    payload.name
                )));
            }
        }

        let (tags, tag_warnings) = normalize_tags(&options.tags)?;
        warnings.extend(tag_warnings);
        let learner_id = validate_reference("learnerId", options.learner_id.as_deref())?;
        let session_id = validate_reference("sessionId", options.session_id.as_deref())?;
        let (notes, notes_warning) = bound_notes(options.notes.as_deref());
        warnings.extend(notes_warning);

        // Serialize everything up front so the ceiling is enforced before any write
        let mut encoded: Vec<(&Payload, Vec<u8>)> = Vec::with_capacity(payloads.len());
        let mut total: u64 = 0;
        for payload in &payloads {
            let bytes = serde_json::to_vec(&payload.document)?;
            total += bytes.len() as u64;
            encoded.push((payload, bytes));
        }
        if total > self.config.max_artifact_bytes {
            return Err(StoreError::SizeExceeded {
                size: total,
                limit: self.config.max_artifact_bytes,
            });
        }

        let generation = ulid::Ulid::new().to_string().to_lowercase();
        let mut files = Vec::with_capacity(encoded.len());
        for (payload, bytes) in &encoded {
            files.push(FileEntry {
                name: payload.name.clone(),
                relative_path: format!("{}/{}.json", generation, payload.name),
                sha256: content_sha256(&payload.document)?,
                size_bytes: bytes.len() as u64,
            });
        }
        let root_sha256 = compute_root_sha256(&files)?;

        let manifest = ArtifactManifest {
            artifact_id: artifact_id.clone(),
            kind,
            created_at: Utc::now(),
            contract_version: CONTRACT_VERSION.to_string(),
            files,
            root_sha256,
            tags,
            learner_id,
            session_id,
            notes,
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;

        // Generations referenced by whatever is committed right now
        let superseded = self.committed_generations(&artifact_id);

        let key = staging_key(&artifact_id, &generation);
        if let Ok(mut set) = self.staging.lock() {
            set.insert(key.clone());
        }
        let _guard = StagingGuard {
            staging: &self.staging,
            key,
        };

        let staged = encoded.iter().zip(&manifest.files).try_for_each(|((_, bytes), entry)| {
            self.backend
                .stage_object(&artifact_id, &entry.relative_path, bytes)
        });
        if let Err(e) = staged {
            self.abandon(&artifact_id, &generation);
            return Err(StoreError::write("staging payloads", e));
        }

        if let Err(e) = self.backend.commit_manifest(&artifact_id, &manifest_bytes) {
            self.abandon(&artifact_id, &generation);
            return Err(StoreError::write("committing manifest", e));
        }

        tracing::info!(
            artifact_id = %artifact_id,
            kind = %kind,
            files = manifest.files.len(),
            bytes = total,
            "artifact committed"
        );

        let mut errors = Vec::new();
        for old in superseded.into_iter().filter(|g| *g != generation) {
            if let Err(e) = self.backend.discard_generation(&artifact_id, &old) {
                tracing::warn!(artifact_id = %artifact_id, generation = %old, error = %e,
                    "failed to discard superseded payloads");
                errors.push(format!("superseded payloads not cleaned up: {}", e));
            }
        }

        Ok(PutOutcome {
            artifact_id,
            manifest,
            errors,
            warnings,
        })
    }

    /// Fetch a committed artifact, verifying every stored hash.
    pub fn get(&self, artifact_id: &str) -> StoreResult<Option<ArtifactBundle>> {
        if validate_artifact_id(artifact_id).is_err() {
            return Ok(None);
        }

        for _ in 0..READ_ATTEMPTS {
            let Some(manifest_bytes) = self.backend.read_manifest(artifact_id)? else {
                return Ok(None);
            };
            let manifest = self.parse_manifest(artifact_id, &manifest_bytes)?;

            match self.read_payloads(&manifest)? {
                Some(payloads) => {
                    tracing::debug!(artifact_id = %artifact_id, files = payloads.len(), "artifact read");
                    return Ok(Some(ArtifactBundle { manifest, payloads }));
                }
                None => {
                    // A payload vanished: either the manifest was replaced under
                    // us (retry against the new one) or the store is damaged.
                    let current = self.backend.read_manifest(artifact_id)?;
                    if current.as_deref() == Some(manifest_bytes.as_slice()) {
                        return Err(StoreError::corrupt(artifact_id, "payload file missing"));
                    }
                }
            }
        }

        Err(StoreError::ReadFailure(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "artifact kept changing while being read",
        )))
    }

    /// Read the manifest only
    pub fn manifest(&self, artifact_id: &str) -> StoreResult<Option<ArtifactManifest>> {
        if validate_artifact_id(artifact_id).is_err() {
            return Ok(None);
        }
        match self.backend.read_manifest(artifact_id)? {
            Some(bytes) => Ok(Some(self.parse_manifest(artifact_id, &bytes)?)),
            None => Ok(None),
        }
    }

    /// List manifests, newest first, never more than 50.
    ///
    /// Tags match inclusively (any listed tag); kind, tags and learner
    /// combine conjunctively.
    pub fn list(&self, filter: &ListFilter) -> StoreResult<Vec<ArtifactManifest>> {
        let cap = self.config.list_cap.min(LIST_HARD_CAP);
        let limit = filter.limit.unwrap_or(cap).min(cap);

        let mut matched = Vec::new();
        for id in self.backend.manifest_ids()? {
            let Some(bytes) = self.backend.read_manifest(&id)? else {
                continue;
            };
            match self.parse_manifest(&id, &bytes) {
                Ok(manifest) if filter.matches(&manifest) => matched.push(manifest),
                Ok(_) => {}
                Err(e) => tracing::warn!(artifact_id = %id, error = %e, "skipping unreadable manifest"),
            }
        }

        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.artifact_id.cmp(&b.artifact_id))
        });
        matched.truncate(limit);
        Ok(matched)
    }

    /// Delete an artifact. Deleting a missing id returns false.
    pub fn delete(&self, artifact_id: &str) -> StoreResult<bool> {
        if validate_artifact_id(artifact_id).is_err() {
            return Ok(false);
        }
        let removed = self
            .backend
            .remove_manifest(artifact_id)
            .map_err(|e| StoreError::write("removing manifest", e))?;

        // Listed after removal so a put committed just before it leaves no payloads
        let mut errors = Vec::new();
        if let Err(e) = self.discard_unreferenced(artifact_id, &mut errors) {
            errors.push(e.to_string());
        }
        for error in errors {
            tracing::warn!(artifact_id = %artifact_id, error = %error, "failed to discard payloads");
        }

        if removed {
            tracing::info!(artifact_id = %artifact_id, "artifact deleted");
        }
        Ok(removed)
    }

    /// Whether a committed manifest exists; never reads payloads
    pub fn exists(&self, artifact_id: &str) -> StoreResult<bool> {
        if validate_artifact_id(artifact_id).is_err() {
            return Ok(false);
        }
        Ok(self.backend.manifest_exists(artifact_id)?)
    }

    /// Recompute every hash for an artifact and report all mismatches
    pub fn verify(&self, artifact_id: &str) -> StoreResult<Option<VerificationReport>> {
        let Some(manifest) = self.manifest(artifact_id)? else {
            return Ok(None);
        };
        let mut problems = Vec::new();

        let actual_root = compute_root_sha256(&manifest.files)?;
        if actual_root != manifest.root_sha256 {
            problems.push(IntegrityProblem::RootHashMismatch {
                expected: manifest.root_sha256.clone(),
                actual: actual_root,
            });
        }

        for entry in &manifest.files {
            let Some(bytes) = self.backend.read_object(artifact_id, &entry.relative_path)? else {
                problems.push(IntegrityProblem::MissingFile {
                    name: entry.name.clone(),
                });
                continue;
            };
            if bytes.len() as u64 != entry.size_bytes {
                problems.push(IntegrityProblem::SizeMismatch {
                    name: entry.name.clone(),
                    expected: entry.size_bytes,
                    actual: bytes.len() as u64,
                });
            }
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(document) => {
                    let actual = content_sha256(&document)?;
                    if actual != entry.sha256 {
                        problems.push(IntegrityProblem::HashMismatch {
                            name: entry.name.clone(),
                            expected: entry.sha256.clone(),
                            actual,
                        });
                    }
                }
                Err(_) => problems.push(IntegrityProblem::Unparseable {
                    name: entry.name.clone(),
                }),
            }
        }

        Ok(Some(VerificationReport {
            artifact_id: artifact_id.to_string(),
            files_checked: manifest.files.len(),
            problems,
        }))
    }

    /// Remove staged generations that no committed manifest references.
    ///
    /// These are left behind by puts interrupted before commit. Generations
    /// being staged by this process are skipped.
    pub fn sweep_orphans(&self) -> StoreResult<SweepReport> {
        let mut report = SweepReport::default();

        for artifact_id in self.backend.object_ids()? {
            report.generations_removed +=
                self.discard_unreferenced(&artifact_id, &mut report.errors)?;
        }

        match self.backend.purge_temp(TEMP_GRACE) {
            Ok(n) => report.temp_files_removed = n,
            Err(e) => report.errors.push(format!("temp purge: {}", e)),
        }

        if report.generations_removed > 0 || report.temp_files_removed > 0 {
            tracing::warn!(
                generations = report.generations_removed,
                temp_files = report.temp_files_removed,
                "swept orphaned staging data"
            );
        }
        Ok(report)
    }

    /// Discard generations of one artifact that are neither staged nor committed.
    ///
    /// The manifest is re-read after each staging check: a put that finished
    /// between the listing and the check is visible in the manifest by then.
    /// An unreadable manifest leaves every generation in place.
    fn discard_unreferenced(&self, artifact_id: &str, errors: &mut Vec<String>) -> StoreResult<usize> {
        let mut removed = 0;
        for generation in self.backend.generations(artifact_id)? {
            if self.is_staging(artifact_id, &generation) {
                continue;
            }
            let committed = match self.manifest(artifact_id) {
                Ok(Some(manifest)) => manifest_generations(&manifest),
                Ok(None) => BTreeSet::new(),
                Err(e) => {
                    errors.push(format!("{}: {}", artifact_id, e));
                    return Ok(removed);
                }
            };
            if committed.contains(&generation) {
                continue;
            }
            match self.backend.discard_generation(artifact_id, &generation) {
                Ok(()) => removed += 1,
                Err(e) => errors.push(format!("{}/{}: {}", artifact_id, generation, e)),
            }
        }
        Ok(removed)
    }

    fn is_staging(&self, artifact_id: &str, generation: &str) -> bool {
        self.staging
            .lock()
            .map(|set| set.contains(&staging_key(artifact_id, generation)))
            .unwrap_or(true)
    }

    fn parse_manifest(&self, artifact_id: &str, bytes: &[u8]) -> StoreResult<ArtifactManifest> {
        let manifest: ArtifactManifest = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::corrupt(artifact_id, format!("unreadable manifest: {}", e)))?;
        if manifest.artifact_id != artifact_id {
            return Err(StoreError::corrupt(artifact_id, "manifest id does not match its record"));
        }
        Ok(manifest)
    }

    /// Generations referenced by the committed manifest (empty when none)
    fn committed_generations(&self, artifact_id: &str) -> BTreeSet<String> {
        match self.manifest(artifact_id) {
            Ok(Some(manifest)) => manifest_generations(&manifest),
            _ => BTreeSet::new(),
        }
    }

    /// Read and verify all payloads. `Ok(None)` means a file was missing.
    fn read_payloads(
        &self,
        manifest: &ArtifactManifest,
    ) -> StoreResult<Option<BTreeMap<String, Value>>> {
        let artifact_id = manifest.artifact_id.as_str();
        if compute_root_sha256(&manifest.files)? != manifest.root_sha256 {
            return Err(StoreError::corrupt(artifact_id, "root hash mismatch"));
        }

        let mut payloads = BTreeMap::new();
        for entry in &manifest.files {
            let Some(bytes) = self.backend.read_object(artifact_id, &entry.relative_path)? else {
                return Ok(None);
            };
            let document: Value = serde_json::from_slice(&bytes).map_err(|_| {
                StoreError::corrupt(artifact_id, format!("payload '{}' is not valid JSON", entry.name))
            })?;
            if content_sha256(&document)? != entry.sha256 {
                return Err(StoreError::corrupt(
                    artifact_id,
                    format!(
                        "payload '{}' hash mismatch (stored bytes {})",
                        entry.name,
                        &sha256_hex(&bytes)[..12]
                    ),
                ));
            }
            payloads.insert(entry.name.clone(), document);
        }
        Ok(Some(payloads))
    }

    fn abandon(&self, artifact_id: &str, generation: &str) {
        if let Err(e) = self.backend.discard_generation(artifact_id, generation) {
            tracing::warn!(artifact_id = %artifact_id, generation = %generation, error = %e,
                "failed to discard staged payloads after failed put");
        }
    }
}
