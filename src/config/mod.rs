//! Layered vault configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Vault file (`vault.toml`)
//! 3. CLI overrides

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
