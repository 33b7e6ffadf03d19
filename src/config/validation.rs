// src/config/validation.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use std::collections::HashSet;
use tracing::{debug, error, warn};
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> Result<()> {
        debug!("Starting configuration validation");

        if let Err(e) = Self::validate_api_keys(config) {
            warn!("API key validation failed: {}", e);
            return Err(e);
        }
        Self::validate_upstream(config)?;
        Self::validate_server(config)?;
        Self::validate_rotation(config)?;

        debug!(
            total_keys = config.api_keys.len(),
            "Configuration validation completed successfully"
        );
        Ok(())
    }

    fn validate_api_keys(config: &AppConfig) -> Result<()> {
        if config.api_keys.is_empty() {
            error!("No API keys found in configuration or environment variables");
            error!("Please set at least one of the following:");
            error!("- SPOONACULAR_API_KEY");
            error!("- SPOONACULAR_API_KEY2");
            error!("- SPOONACULAR_API_KEY3");
            return Err(invalid("api_keys", "No API keys configured"));
        }

        let mut seen = HashSet::new();
        for (index, key) in config.api_keys.iter().enumerate() {
            if key.trim().is_empty() {
                return Err(invalid("api_keys", format!("API key at index {index} is blank")));
            }
            if !seen.insert(key) {
                return Err(invalid(
                    "api_keys",
                    format!("Duplicate API key at index {index}: {}", preview_key(key)),
                ));
            }
        }
        Ok(())
    }

    fn validate_upstream(config: &AppConfig) -> Result<()> {
        let base_url = &config.upstream.base_url;
        let url = Url::parse(base_url).map_err(|e| {
            invalid("upstream.base_url", format!("Invalid URL {base_url}: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(
                "upstream.base_url",
                format!("Unsupported scheme '{}'", url.scheme()),
            ));
        }
        if config.upstream.api_key_param.trim().is_empty() {
            return Err(invalid("upstream.api_key_param", "Parameter name cannot be empty"));
        }
        Ok(())
    }

    fn validate_server(config: &AppConfig) -> Result<()> {
        if config.server.host.trim().is_empty() {
            return Err(invalid("server.host", "Bind address cannot be empty"));
        }
        if config.server.port == 0 {
            return Err(invalid("server.port", "Server port cannot be 0"));
        }
        if config.server.connect_timeout_secs == 0 {
            return Err(invalid("server.connect_timeout_secs", "Connect timeout cannot be 0"));
        }
        if config.server.request_timeout_secs == Some(0) {
            return Err(invalid("server.request_timeout_secs", "Request timeout cannot be 0"));
        }
        Ok(())
    }

    fn validate_rotation(config: &AppConfig) -> Result<()> {
        let rotation = &config.rotation;
        for (field, value) in [
            ("rotation.payment_required_cooldown_minutes", rotation.payment_required_cooldown_minutes),
            ("rotation.rate_limited_cooldown_minutes", rotation.rate_limited_cooldown_minutes),
            ("rotation.unauthorized_cooldown_hours", rotation.unauthorized_cooldown_hours),
        ] {
            if value == 0 {
                return Err(invalid(field, "Cooldown cannot be 0"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, message: impl std::fmt::Display) -> AppError {
    AppError::Config(format!("{field}: {message}"))
}

/// `abcd...wxyz` for anything longer than eight characters.
pub fn preview_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
