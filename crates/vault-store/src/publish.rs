//! Stage-then-commit publishing backends.
//!
//! An artifact becomes visible only when its manifest record is committed.
//! Payload objects are staged first under a generation directory that no
//! committed manifest references yet, so a reader either resolves the prior
//! manifest (and its generation) or the new one, never a mix.
//!
//! Filesystem layout (`FsBackend`):
//! `<root>/manifests/<artifact_id>.json`: commit marker, swapped by rename
//! `<root>/objects/<artifact_id>/<generation>/<name>.json`: staged payloads
//! `<root>/.tmp/`: temp files for manifest swaps

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

/// Storage-agnostic stage/commit interface.
///
/// `relative_path` values are always `<generation>/<file>`.
pub trait PublishBackend: Send + Sync + fmt::Debug {
    /// Write a payload object that no reader can reach until committed.
    fn stage_object(&self, artifact_id: &str, relative_path: &str, bytes: &[u8]) -> io::Result<()>;

    /// Atomically replace (or create) the manifest record for an artifact.
    fn commit_manifest(&self, artifact_id: &str, manifest: &[u8]) -> io::Result<()>;

    fn read_manifest(&self, artifact_id: &str) -> io::Result<Option<Vec<u8>>>;

    fn read_object(&self, artifact_id: &str, relative_path: &str) -> io::Result<Option<Vec<u8>>>;

    /// Cheap presence check; never reads payload bodies.
    fn manifest_exists(&self, artifact_id: &str) -> io::Result<bool>;

    /// Ids of every committed manifest.
    fn manifest_ids(&self) -> io::Result<Vec<String>>;

    /// Remove the manifest record. Returns false if there was none.
    fn remove_manifest(&self, artifact_id: &str) -> io::Result<bool>;

    /// Remove every object staged under a generation. Missing is not an error.
    fn discard_generation(&self, artifact_id: &str, generation: &str) -> io::Result<()>;

    /// Generations with staged objects for an artifact.
    fn generations(&self, artifact_id: &str) -> io::Result<Vec<String>>;

    /// Artifact ids that have any staged objects.
    fn object_ids(&self) -> io::Result<Vec<String>>;

    /// Remove leftover temp files older than `older_than`. Returns the count.
    fn purge_temp(&self, _older_than: Duration) -> io::Result<usize> {
        Ok(0)
    }
}

/// Local filesystem backend.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    const MANIFESTS_DIR: &'static str = "manifests";
    const OBJECTS_DIR: &'static str = "objects";
    const TEMP_DIR: &'static str = ".tmp";

    /// Open (creating if needed) a backend rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(Self::MANIFESTS_DIR))?;
        fs::create_dir_all(root.join(Self::OBJECTS_DIR))?;
        fs::create_dir_all(root.join(Self::TEMP_DIR))?;

        // Verify the root is writable
        let check = root.join(Self::TEMP_DIR).join(".check");
        File::create(&check)?;
        fs::remove_file(&check)?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self, artifact_id: &str) -> PathBuf {
        self.root
            .join(Self::MANIFESTS_DIR)
            .join(format!("{}.json", artifact_id))
    }

    fn object_dir(&self, artifact_id: &str) -> PathBuf {
        self.root.join(Self::OBJECTS_DIR).join(artifact_id)
    }

    fn temp_path(&self, artifact_id: &str) -> PathBuf {
        let unique = ulid::Ulid::new().to_string().to_lowercase();
        self.root
            .join(Self::TEMP_DIR)
            .join(format!(".{}.{}.tmp", artifact_id, unique))
    }

    fn list_dir_names(dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl PublishBackend for FsBackend {
    fn stage_object(&self, artifact_id: &str, relative_path: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.object_dir(artifact_id).join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn commit_manifest(&self, artifact_id: &str, manifest: &[u8]) -> io::Result<()> {
        let temp_path = self.temp_path(artifact_id);
        let final_path = self.manifest_path(artifact_id);

        let write_result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(manifest)?;
            file.sync_all()?;
            fs::rename(&temp_path, &final_path)
        })();

        if write_result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        write_result
    }

    fn read_manifest(&self, artifact_id: &str) -> io::Result<Option<Vec<u8>>> {
        read_optional(&self.manifest_path(artifact_id))
    }

    fn read_object(&self, artifact_id: &str, relative_path: &str) -> io::Result<Option<Vec<u8>>> {
        read_optional(&self.object_dir(artifact_id).join(relative_path))
    }

    fn manifest_exists(&self, artifact_id: &str) -> io::Result<bool> {
        match fs::metadata(self.manifest_path(artifact_id)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn manifest_ids(&self) -> io::Result<Vec<String>> {
        let names = Self::list_dir_names(&self.root.join(Self::MANIFESTS_DIR))?;
        Ok(names
            .into_iter()
            .filter_map(|n| n.strip_suffix(".json").map(str::to_string))
            .collect())
    }

    fn remove_manifest(&self, artifact_id: &str) -> io::Result<bool> {
        match fs::remove_file(self.manifest_path(artifact_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn discard_generation(&self, artifact_id: &str, generation: &str) -> io::Result<()> {
        let dir = self.object_dir(artifact_id).join(generation);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        // Drop the per-artifact directory once it holds nothing
        let _ = fs::remove_dir(self.object_dir(artifact_id));
        Ok(())
    }

    fn generations(&self, artifact_id: &str) -> io::Result<Vec<String>> {
        Self::list_dir_names(&self.object_dir(artifact_id))
    }

    fn object_ids(&self) -> io::Result<Vec<String>> {
        Self::list_dir_names(&self.root.join(Self::OBJECTS_DIR))
    }

    fn purge_temp(&self, older_than: Duration) -> io::Result<usize> {
        let temp_dir = self.root.join(Self::TEMP_DIR);
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;

        for name in Self::list_dir_names(&temp_dir)? {
            let path = temp_dir.join(&name);
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if modified <= cutoff && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// In-process backend. Each operation is atomic under its lock.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    manifests: RwLock<HashMap<String, Vec<u8>>>,
    /// artifact id -> relative path -> bytes
    objects: RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "backend lock poisoned")
}

impl PublishBackend for MemoryBackend {
    fn stage_object(&self, artifact_id: &str, relative_path: &str, bytes: &[u8]) -> io::Result<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects
            .entry(artifact_id.to_string())
            .or_default()
            .insert(relative_path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn commit_manifest(&self, artifact_id: &str, manifest: &[u8]) -> io::Result<()> {
        let mut manifests = self.manifests.write().map_err(|_| poisoned())?;
        manifests.insert(artifact_id.to_string(), manifest.to_vec());
        Ok(())
    }

    fn read_manifest(&self, artifact_id: &str) -> io::Result<Option<Vec<u8>>> {
        let manifests = self.manifests.read().map_err(|_| poisoned())?;
        Ok(manifests.get(artifact_id).cloned())
    }

    fn read_object(&self, artifact_id: &str, relative_path: &str) -> io::Result<Option<Vec<u8>>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects
            .get(artifact_id)
            .and_then(|files| files.get(relative_path))
            .cloned())
    }

    fn manifest_exists(&self, artifact_id: &str) -> io::Result<bool> {
        let manifests = self.manifests.read().map_err(|_| poisoned())?;
        Ok(manifests.contains_key(artifact_id))
    }

    fn manifest_ids(&self) -> io::Result<Vec<String>> {
        let manifests = self.manifests.read().map_err(|_| poisoned())?;
        let mut ids: Vec<String> = manifests.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn remove_manifest(&self, artifact_id: &str) -> io::Result<bool> {
        let mut manifests = self.manifests.write().map_err(|_| poisoned())?;
        Ok(manifests.remove(artifact_id).is_some())
    }

    fn discard_generation(&self, artifact_id: &str, generation: &str) -> io::Result<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let prefix = format!("{}/", generation);
        if let Some(files) = objects.get_mut(artifact_id) {
            files.retain(|path, _| !path.starts_with(&prefix));
            if files.is_empty() {
                objects.remove(artifact_id);
            }
        }
        Ok(())
    }

    fn generations(&self, artifact_id: &str) -> io::Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        let generations: BTreeSet<String> = objects
            .get(artifact_id)
            .map(|files| {
                files
                    .keys()
                    .filter_map(|p| p.split('/').next().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(generations.into_iter().collect())
    }

    fn object_ids(&self) -> io::Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise_backend(backend: &dyn PublishBackend) {
        assert!(!backend.manifest_exists("a1").unwrap());
        assert_eq!(backend.read_manifest("a1").unwrap(), None);

        backend.stage_object("a1", "g1/doc.json", b"{}").unwrap();
        // staged objects do not make the artifact visible
        assert!(!backend.manifest_exists("a1").unwrap());
        assert_eq!(backend.generations("a1").unwrap(), vec!["g1"]);

        backend.commit_manifest("a1", b"manifest-v1").unwrap();
        assert!(backend.manifest_exists("a1").unwrap());
        assert_eq!(backend.read_manifest("a1").unwrap().unwrap(), b"manifest-v1");
        assert_eq!(backend.read_object("a1", "g1/doc.json").unwrap().unwrap(), b"{}");
        assert_eq!(backend.manifest_ids().unwrap(), vec!["a1"]);

        backend.commit_manifest("a1", b"manifest-v2").unwrap();
        assert_eq!(backend.read_manifest("a1").unwrap().unwrap(), b"manifest-v2");

        backend.discard_generation("a1", "g1").unwrap();
        assert_eq!(backend.read_object("a1", "g1/doc.json").unwrap(), None);
        assert!(backend.generations("a1").unwrap().is_empty());
        // discarding twice is fine
        backend.discard_generation("a1", "g1").unwrap();

        assert!(backend.remove_manifest("a1").unwrap());
        assert!(!backend.remove_manifest("a1").unwrap());
        assert!(backend.manifest_ids().unwrap().is_empty());
    }

    #[test]
    fn test_fs_backend_contract() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::open(dir.path()).unwrap();
        exercise_backend(&backend);
    }

    #[test]
    fn test_memory_backend_contract() {
        exercise_backend(&MemoryBackend::new());
    }

    #[test]
    fn test_fs_commit_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::open(dir.path()).unwrap();
        backend.commit_manifest("a1", b"m").unwrap();

        let leftovers = fs::read_dir(dir.path().join(".tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
        assert!(dir.path().join("manifests/a1.json").is_file());
    }

    #[test]
    fn test_fs_purge_temp_respects_age() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::open(dir.path()).unwrap();
        fs::write(dir.path().join(".tmp/.a1.stale.tmp"), b"x").unwrap();

        assert_eq!(backend.purge_temp(Duration::from_secs(3600)).unwrap(), 0);
        assert_eq!(backend.purge_temp(Duration::ZERO).unwrap(), 1);
    }

    #[test]
    fn test_memory_generations_are_distinct() {
        let backend = MemoryBackend::new();
        backend.stage_object("a1", "g1/x.json", b"1").unwrap();
        backend.stage_object("a1", "g2/x.json", b"2").unwrap();
        backend.stage_object("a1", "g2/y.json", b"3").unwrap();
        assert_eq!(backend.generations("a1").unwrap(), vec!["g1", "g2"]);
        backend.discard_generation("a1", "g1").unwrap();
        assert_eq!(backend.read_object("a1", "g2/y.json").unwrap().unwrap(), b"3");
        assert_eq!(backend.object_ids().unwrap(), vec!["a1"]);
    }
}
