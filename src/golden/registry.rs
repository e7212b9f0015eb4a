//! Golden case registration

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use vault_protocol::{GoldenCase, Summary, MAX_LABEL_CHARS};
use vault_store::{validate_artifact_id, ArtifactStore};
use vault_summarizer::summarize;

use super::file::GoldenSuiteFile;
use crate::error::{VaultError, VaultResult};

/// Request to register a golden case
#[derive(Debug, Clone)]
pub struct NewGoldenCase {
    pub artifact_id: String,
    pub label: String,
    pub expected: Summary,
    pub skip: bool,
}

/// Outcome of `add_golden_case`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    pub ok: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Registry of golden cases, optionally backed by a file.
///
/// At most one case per artifact id. Registration order is preserved.
#[derive(Debug)]
pub struct GoldenRegistry {
    store: Arc<ArtifactStore>,
    path: Option<PathBuf>,
    cases: Mutex<Vec<GoldenCase>>,
}

impl GoldenRegistry {
    /// Registry that lives only as long as this value
    pub fn in_memory(store: Arc<ArtifactStore>) -> Self {
        Self {
            store,
            path: None,
            cases: Mutex::new(Vec::new()),
        }
    }

    /// Open a file-backed registry, loading existing cases
    pub fn open(store: Arc<ArtifactStore>, path: impl AsRef<Path>) -> VaultResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = GoldenSuiteFile::load(&path)
            .map_err(|e| VaultError::ReadFailure(format!("loading golden suite: {}", e)))?;
        tracing::debug!(cases = file.cases.len(), "golden suite loaded");
        Ok(Self {
            store,
            path: Some(path),
            cases: Mutex::new(file.cases),
        })
    }

    /// Register a golden case.
    ///
    /// A duplicate artifact id is reported with `ok: false` and leaves the
    /// existing case untouched. An artifact that does not exist is a
    /// `SuiteIntegrity` error.
    pub fn add_golden_case(&self, new_case: NewGoldenCase) -> VaultResult<RegistrationOutcome> {
        validate_artifact_id(&new_case.artifact_id)?;
        let mut warnings = Vec::new();
        let label = bound_label(&new_case.label, &new_case.artifact_id, &mut warnings);

        let mut cases = self.lock()?;
        if cases.iter().any(|c| c.artifact_id == new_case.artifact_id) {
            return Ok(RegistrationOutcome {
                ok: false,
                message: format!(
                    "golden case for {} is already registered",
                    new_case.artifact_id
                ),
                warnings,
            });
        }

        let manifest = self.store.manifest(&new_case.artifact_id)?.ok_or_else(|| {
            VaultError::SuiteIntegrity(format!(
                "artifact {} does not exist",
                new_case.artifact_id
            ))
        })?;
        if manifest.kind != new_case.expected.kind {
            return Err(VaultError::Validation(format!(
                "expected summary is for {} but artifact {} is a {}",
                new_case.expected.kind, new_case.artifact_id, manifest.kind
            )));
        }

        cases.push(GoldenCase {
            artifact_id: new_case.artifact_id.clone(),
            label: label.clone(),
            expected: new_case.expected,
            skip: new_case.skip,
            added_at: Utc::now(),
        });
        if let Err(e) = self.persist(&cases) {
            cases.pop();
            return Err(e);
        }

        tracing::info!(artifact_id = %new_case.artifact_id, label = %label, "golden case registered");
        Ok(RegistrationOutcome {
            ok: true,
            message: format!("registered golden case '{}' for {}", label, new_case.artifact_id),
            warnings,
        })
    }

    /// Summarize the artifact as it is now and register that as expected
    pub fn register_current(
        &self,
        artifact_id: &str,
        label: &str,
        skip: bool,
    ) -> VaultResult<RegistrationOutcome> {
        let bundle = self.store.get(artifact_id)?.ok_or_else(|| {
            VaultError::SuiteIntegrity(format!("artifact {} does not exist", artifact_id))
        })?;
        let expected = summarize(bundle.manifest.kind, &bundle)?;
        self.add_golden_case(NewGoldenCase {
            artifact_id: artifact_id.to_string(),
            label: label.to_string(),
            expected,
            skip,
        })
    }

    /// Active (non-skipped) cases in registration order
    pub fn get_golden_suite(&self) -> VaultResult<Vec<GoldenCase>> {
        Ok(self.lock()?.iter().filter(|c| !c.skip).cloned().collect())
    }

    /// Every registered case, skipped ones included
    pub fn cases(&self) -> VaultResult<Vec<GoldenCase>> {
        Ok(self.lock()?.clone())
    }

    /// Mark a case skipped (or active). Returns false if no such case.
    pub fn set_skip(&self, artifact_id: &str, skip: bool) -> VaultResult<bool> {
        let mut cases = self.lock()?;
        let Some(index) = cases.iter().position(|c| c.artifact_id == artifact_id) else {
            return Ok(false);
        };
        let previous = cases[index].skip;
        cases[index].skip = skip;
        if let Err(e) = self.persist(&cases) {
            cases[index].skip = previous;
            return Err(e);
        }
        tracing::info!(artifact_id = %artifact_id, skip, "golden case updated");
        Ok(true)
    }

    fn lock(&self) -> VaultResult<MutexGuard<'_, Vec<GoldenCase>>> {
        self.cases
            .lock()
            .map_err(|_| VaultError::WriteFailure("golden registry lock poisoned".to_string()))
    }

    fn persist(&self, cases: &[GoldenCase]) -> VaultResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        GoldenSuiteFile::new(cases.to_vec())
            .write_to_file(path)
            .map_err(|e| VaultError::WriteFailure(format!("saving golden suite: {}", e)))
    }
}

/// Trim a label to `MAX_LABEL_CHARS`, falling back to the artifact id when blank.
fn bound_label(label: &str, artifact_id: &str, warnings: &mut Vec<String>) -> String {
    let label = label.trim();
    if label.is_empty() {
        return artifact_id.to_string();
    }
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_string();
    }
    tracing::warn!(artifact_id = %artifact_id, "golden case label truncated");
    warnings.push(format!("label truncated to {} characters", MAX_LABEL_CHARS));
    let mut bounded: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
    bounded.push('…');
    bounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use vault_protocol::ArtifactKind;
    use vault_store::{Payload, PutOptions, StoreConfig};

    fn store_with(ids: &[&str]) -> Arc<ArtifactStore> {
        let store = ArtifactStore::in_memory(StoreConfig::default());
        for id in ids {
            store
                .put(
                    ArtifactKind::KernelRun,
                    vec![Payload::new("kernel_run", json!({"outcome": "S1", "confidence": "High"}))],
                    PutOptions::with_id(*id),
                )
                .unwrap();
        }
        Arc::new(store)
    }

    fn new_case(id: &str, label: &str) -> NewGoldenCase {
        let mut expected = Summary::new(ArtifactKind::KernelRun, 1);
        expected.outcome = Some("S1".to_string());
        NewGoldenCase {
            artifact_id: id.to_string(),
            label: label.to_string(),
            expected,
            skip: false,
        }
    }

    #[test]
    fn test_duplicate_is_not_ok_and_keeps_first() {
        let registry = GoldenRegistry::in_memory(store_with(&["kr-1"]));
        assert!(registry.add_golden_case(new_case("kr-1", "first")).unwrap().ok);

        let second = registry.add_golden_case(new_case("kr-1", "second")).unwrap();
        assert!(!second.ok);
        let cases = registry.cases().unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].label, "first");
    }

    #[test]
    fn test_missing_artifact_is_integrity_error() {
        let registry = GoldenRegistry::in_memory(store_with(&[]));
        let err = registry.add_golden_case(new_case("ghost", "x")).unwrap_err();
        assert!(matches!(err, VaultError::SuiteIntegrity(_)));
        assert!(registry.cases().unwrap().is_empty());
    }

    #[test]
    fn test_long_label_truncated_with_warning() {
        let registry = GoldenRegistry::in_memory(store_with(&["kr-1"]));
        let outcome = registry
            .add_golden_case(new_case("kr-1", &"L".repeat(80)))
            .unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.warnings.len(), 1);
        let label = &registry.cases().unwrap()[0].label;
        assert_eq!(label.chars().count(), MAX_LABEL_CHARS);
        assert!(label.ends_with('…'));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let registry = GoldenRegistry::in_memory(store_with(&["kr-1"]));
        let mut case = new_case("kr-1", "x");
        case.expected.kind = ArtifactKind::Bundle;
        assert!(matches!(
            registry.add_golden_case(case),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn test_suite_excludes_skipped_and_keeps_order() {
        let registry = GoldenRegistry::in_memory(store_with(&["c", "a", "b"]));
        for id in ["c", "a", "b"] {
            registry.add_golden_case(new_case(id, id)).unwrap();
        }
        assert!(registry.set_skip("a", true).unwrap());
        assert!(!registry.set_skip("missing", true).unwrap());

        let ids: Vec<_> = registry
            .get_golden_suite()
            .unwrap()
            .into_iter()
            .map(|c| c.artifact_id)
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(registry.cases().unwrap().len(), 3);
    }

    #[test]
    fn test_register_current_uses_live_summary() {
        let registry = GoldenRegistry::in_memory(store_with(&["kr-1"]));
        registry.register_current("kr-1", "baseline", false).unwrap();
        let case = &registry.cases().unwrap()[0];
        assert_eq!(case.expected.outcome.as_deref(), Some("S1"));
        assert_eq!(case.expected.count("payloadFiles"), 1);
    }

    #[test]
    fn test_file_backed_registry_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("golden_suite.json");
        let store = store_with(&["kr-1", "kr-2"]);

        let registry = GoldenRegistry::open(store.clone(), &path).unwrap();
        registry.add_golden_case(new_case("kr-1", "one")).unwrap();
        registry.add_golden_case(new_case("kr-2", "two")).unwrap();
        registry.set_skip("kr-2", true).unwrap();
        drop(registry);

        let reopened = GoldenRegistry::open(store, &path).unwrap();
        let cases = reopened.cases().unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases[1].skip);
        assert!(!reopened.add_golden_case(new_case("kr-1", "again")).unwrap().ok);
    }
}
