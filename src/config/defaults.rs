//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};
use vault_store::DEFAULT_MAX_ARTIFACT_BYTES;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Vault root directory (default: ".vault")
    pub root: String,

    /// Per-artifact payload ceiling in bytes (default: 512 KiB)
    pub max_artifact_bytes: u64,

    /// Default number of manifests returned by `list` (default: 50)
    pub list_cap: u64,

    /// Golden suite file, relative to the root (default: "golden_suite.json")
    pub golden_path: String,

    /// Run suite cases in parallel (default: true)
    pub harness_parallel: bool,

    /// Fallback tracing filter when RUST_LOG is unset (default: "info")
    pub log_filter: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            root: ".vault".to_string(),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            list_cap: vault_protocol::LIST_HARD_CAP as u64,
            golden_path: "golden_suite.json".to_string(),
            harness_parallel: true,
            log_filter: "info".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "root": self.root,
            "max_artifact_bytes": self.max_artifact_bytes,
            "list_cap": self.list_cap,
            "golden": {
                "path": self.golden_path
            },
            "harness": {
                "parallel": self.harness_parallel
            },
            "log": {
                "filter": self.log_filter
            }
        })
    }
}
