//! Configuration loading.
//!
//! Reads a [`PipelineConfig`] from a YAML file. Every field has a serde
//! default, so a partial (or empty) file is valid. The inference API key
//! can also come from the `SESSIONGUARD_API_KEY` environment variable,
//! which takes precedence over the file so keys stay out of config files.

use sessionguard_core::{PipelineConfig, Result, SessionGuardError};
use std::path::Path;

const API_KEY_ENV: &str = "SESSIONGUARD_API_KEY";

/// Load configuration from a YAML file and apply environment overrides.
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SessionGuardError::Config(format!("cannot read config file {}: {e}", path.display()))
    })?;
    let mut config: PipelineConfig = serde_yaml::from_str(&raw).map_err(|e| {
        SessionGuardError::Config(format!("invalid config file {}: {e}", path.display()))
    })?;

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.is_empty() {
            config.detection.api_key = Some(key);
        }
    }

    Ok(config)
}
