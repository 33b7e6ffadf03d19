// src/config/app.rs

use crate::key_state::CooldownPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Unset means the HTTP client default (no overall deadline).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Query parameter that carries the key.
    #[serde(default = "default_api_key_param")]
    pub api_key_param: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_param: default_api_key_param(),
        }
    }
}

/// What `rotate` does when every key is cooling down or deactivated.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Force the cursor back to the first key and try it anyway.
    #[default]
    FallbackToFirst,
    /// Refuse to pick a key.
    Fail,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RotationConfig {
    #[serde(default)]
    pub exhausted_policy: ExhaustedPolicy,
    #[serde(default = "default_payment_required_cooldown")]
    pub payment_required_cooldown_minutes: u32,
    #[serde(default = "default_rate_limited_cooldown")]
    pub rate_limited_cooldown_minutes: u32,
    #[serde(default = "default_unauthorized_cooldown")]
    pub unauthorized_cooldown_hours: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            exhausted_policy: ExhaustedPolicy::default(),
            payment_required_cooldown_minutes: default_payment_required_cooldown(),
            rate_limited_cooldown_minutes: default_rate_limited_cooldown(),
            unauthorized_cooldown_hours: default_unauthorized_cooldown(),
        }
    }
}

impl RotationConfig {
    pub fn cooldown_policy(&self) -> CooldownPolicy {
        CooldownPolicy {
            quota_exhausted: chrono::Duration::minutes(i64::from(
                self.payment_required_cooldown_minutes,
            )),
            rate_limited: chrono::Duration::minutes(i64::from(self.rate_limited_cooldown_minutes)),
            unauthorized: chrono::Duration::hours(i64::from(self.unauthorized_cooldown_hours)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    /// Rotation order. Replaced wholesale by keys found in the environment.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_base_url() -> String {
    "https://api.spoonacular.com".to_string()
}

fn default_api_key_param() -> String {
    "apiKey".to_string()
}

fn default_payment_required_cooldown() -> u32 {
    60
}

fn default_rate_limited_cooldown() -> u32 {
    15
}

fn default_unauthorized_cooldown() -> u32 {
    24
}
