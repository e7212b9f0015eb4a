//! On-disk golden suite document (golden_suite.json)

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use vault_protocol::GoldenCase;

/// Schema version for golden_suite.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "artifact-vault/golden_suite@1";

/// Persisted golden suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenSuiteFile {
    pub schema_version: u32,

    pub schema_id: String,

    /// Cases in registration order
    pub cases: Vec<GoldenCase>,
}

impl GoldenSuiteFile {
    pub fn new(cases: Vec<GoldenCase>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            cases,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load from file; a missing file is an empty suite
    pub fn load(path: &Path) -> io::Result<Self> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new(Vec::new())),
            Err(e) => return Err(e),
        };
        let file = Self::from_json(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if file.schema_version != SCHEMA_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported golden suite schema version {}", file.schema_version),
            ));
        }
        Ok(file)
    }

    /// Write atomically (write temp, fsync, rename)
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = path.with_extension("json.tmp");
        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}
