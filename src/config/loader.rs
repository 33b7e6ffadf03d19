// src/config/loader.rs

use crate::config::{AppConfig, ConfigValidator, EnvironmentConfig};
use crate::error::Result;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from file (if present), then apply `env` and validate.
pub fn load_config_with_env(config_path: &Path, env: &EnvironmentConfig) -> Result<AppConfig> {
    load_config_with(config_path, env, |_| {})
}

/// Like [`load_config_with_env`], with `overrides` applied after the
/// environment and before validation.
pub fn load_config_with<F>(
    config_path: &Path,
    env: &EnvironmentConfig,
    overrides: F,
) -> Result<AppConfig>
where
    F: FnOnce(&mut AppConfig),
{
    let mut config = if config_path.exists() {
        info!("Loading configuration from file: {}", config_path.display());
        load_from_file(config_path)?
    } else {
        info!("Configuration file not found, using defaults");
        AppConfig::default()
    };

    if env.has_overrides() {
        debug!(overrides = ?env.override_summary(), "Applying environment overrides");
        env.apply(&mut config);
    }
    overrides(&mut config);

    ConfigValidator::validate(&config)?;

    debug!("Configuration loaded and validated successfully");
    Ok(config)
}

fn load_from_file(config_path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(config_path)?;
    if content.trim().is_empty() {
        warn!("Config file '{}' is empty. Using defaults.", config_path.display());
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(&content)?)
}
