//! Artifact Vault
//!
//! Content-addressed storage for decision artifacts (kernel runs,
//! orchestrator runs, session recaps, bundles, contact inquiries) plus a
//! golden-suite regression harness that re-summarizes stored artifacts and
//! reports drift against registered expectations.

pub mod boundary;
pub mod config;
pub mod error;
pub mod golden;
pub mod harness;

use std::sync::Arc;

pub use config::{ConfigError, EffectiveConfig};
pub use error::{VaultError, VaultResult};
pub use golden::{GoldenRegistry, NewGoldenCase, RegistrationOutcome};
pub use harness::RegressionHarness;

pub use vault_protocol::{
    ArtifactBundle, ArtifactKind, ArtifactManifest, BoundaryError, DiffEntry, DiffReport,
    ErrorCode, GoldenCase, Severity, SuiteReport, Summary,
};
pub use vault_store::{
    ArtifactStore, ListFilter, Payload, PutOptions, PutOutcome, StoreConfig, SweepReport,
    VerificationReport,
};
pub use vault_summarizer::{diff_summaries, summarize, summarize_payload, SummarizationError};

/// Store, golden registry and harness wired from one configuration
#[derive(Debug)]
pub struct Vault {
    pub store: Arc<ArtifactStore>,
    pub registry: GoldenRegistry,
    pub harness: RegressionHarness,
}

impl Vault {
    /// Open the filesystem vault described by `config`
    pub fn open(config: &EffectiveConfig) -> VaultResult<Self> {
        let store = Arc::new(ArtifactStore::open(config.root(), config.store_config())?);
        let registry = GoldenRegistry::open(store.clone(), config.golden_path())?;
        let harness = RegressionHarness::new(store.clone()).with_parallel(config.harness_parallel());
        tracing::debug!(root = %config.root().display(), "vault opened");
        Ok(Self {
            store,
            registry,
            harness,
        })
    }

    /// Run every active golden case
    pub fn run_suite(&self) -> VaultResult<SuiteReport> {
        let cases = self.registry.get_golden_suite()?;
        Ok(self.harness.run_golden_suite(&cases))
    }
}
