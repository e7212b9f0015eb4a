//! Golden suite registry
//!
//! Golden cases pin the summary an artifact is expected to produce. The
//! registry is persisted as a single JSON document (`golden_suite.json`),
//! replaced atomically on every change.

mod file;
mod registry;

pub use file::{GoldenSuiteFile, SCHEMA_ID, SCHEMA_VERSION};
pub use registry::{GoldenRegistry, NewGoldenCase, RegistrationOutcome};
