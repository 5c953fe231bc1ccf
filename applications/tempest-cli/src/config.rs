//! Settings loading
//!
//! Engine settings come from an optional TOML file, overridden by
//! environment variables (`TEMPEST_LATENCY_MS=50`, `TEMPEST_SOUND_OUT_MODE=compatibility`).
//! Anything not set keeps its default.

use std::path::Path;
use tempest_playback::EngineSettings;
use thiserror::Error;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TEMPEST";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Load engine settings from `path` (if given) and `<env_prefix>_*` variables
pub fn load_settings(path: Option<&Path>, env_prefix: &str) -> Result<EngineSettings, ConfigError> {
    let mut settings = config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        settings = settings.add_source(config::File::from(path));
    }

    // Single underscores belong to field names, so nesting uses "__".
    // Values stay strings until deserialized so a device id of "-0" survives.
    settings = settings.add_source(
        config::Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__"),
    );

    let config = settings
        .build()
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Invalid(e.to_string()))
}
