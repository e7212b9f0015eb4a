//! Effective configuration with provenance
//!
//! The merged configuration plus where each layer came from, so `vault config`
//! can show exactly which file produced a setting.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use vault_protocol::LIST_HARD_CAP;
use vault_store::StoreConfig;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

pub const SCHEMA_ID: &str = "artifact-vault/effective_config@1";

/// Upper bound accepted for `max_artifact_bytes` (16 MiB)
const MAX_ARTIFACT_BYTES_CEILING: u64 = 16 * 1024 * 1024;

/// Which layer a setting came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// Set for file layers only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the file as read, so a run can be tied to exact settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged vault settings and the layers that produced them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_id: String,

    pub config: Value,

    /// Lowest precedence first
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build the effective config. A missing `file_path` is skipped.
    pub fn build(file_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = file_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        Self::validate_config(&merged)?;

        Ok(Self {
            schema_id: SCHEMA_ID.to_string(),
            config: merged,
            sources,
        })
    }

    /// Parse `vault.toml` into JSON and digest its raw bytes
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;
        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => Value::Array(arr.into_iter().map(Self::toml_to_json).collect()),
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        // max_artifact_bytes must be in (0, 16 MiB]
        match config.get("max_artifact_bytes").map(Value::as_u64) {
            Some(Some(n)) if n > 0 && n <= MAX_ARTIFACT_BYTES_CEILING => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "max_artifact_bytes must be an integer in (0, {}]",
                    MAX_ARTIFACT_BYTES_CEILING
                )))
            }
        }

        // list_cap must be in (0, 50]
        match config.get("list_cap").map(Value::as_u64) {
            Some(Some(n)) if n > 0 && n <= LIST_HARD_CAP as u64 => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "list_cap must be an integer in (0, {}]",
                    LIST_HARD_CAP
                )))
            }
        }

        for key in ["root", "golden.path", "log.filter"] {
            let value = key
                .split('.')
                .try_fold(config, |v, part| v.get(part))
                .and_then(Value::as_str);
            if value.map_or(true, str::is_empty) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a non-empty string",
                    key
                )));
            }
        }

        if config.pointer("/harness/parallel").and_then(Value::as_bool).is_none() {
            return Err(ConfigError::ValidationError(
                "harness.parallel must be a boolean".to_string(),
            ));
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Look up a dotted key such as `harness.parallel`
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.config, |v, part| v.get(part))
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }

    /// Vault root directory
    pub fn root(&self) -> PathBuf {
        PathBuf::from(self.get_str("root").unwrap_or(".vault"))
    }

    /// Golden suite file; relative paths resolve under the root
    pub fn golden_path(&self) -> PathBuf {
        let path = Path::new(self.get_str("golden.path").unwrap_or("golden_suite.json"));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    pub fn harness_parallel(&self) -> bool {
        self.get_bool("harness.parallel").unwrap_or(true)
    }

    pub fn log_filter(&self) -> &str {
        self.get_str("log.filter").unwrap_or("info")
    }

    /// Store limits taken from this config
    pub fn store_config(&self) -> StoreConfig {
        let defaults = StoreConfig::default();
        StoreConfig {
            max_artifact_bytes: self
                .get_u64("max_artifact_bytes")
                .unwrap_or(defaults.max_artifact_bytes),
            list_cap: self
                .get_u64("list_cap")
                .map(|n| n as usize)
                .unwrap_or(defaults.list_cap),
        }
    }
}

/// Errors building the effective config
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
