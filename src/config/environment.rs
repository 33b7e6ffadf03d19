//! Environment-based configuration management

use crate::config::AppConfig;
use std::env;
use tracing::{info, warn};

/// Base name of the key variables: `SPOONACULAR_API_KEY`, `SPOONACULAR_API_KEY2`, ...
pub const API_KEY_VAR: &str = "SPOONACULAR_API_KEY";
const MAX_NUMBERED_KEY: u32 = 10;
/// Older deployments only set the third slot.
const LEGACY_KEY_SLOT: u32 = 3;

const PORT_VAR: &str = "PORT";
const UPSTREAM_URL_VAR: &str = "RECIPE_PROXY_UPSTREAM_URL";

/// Environment values that override the file-based config.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfig {
    pub port: Option<u16>,
    pub upstream_base_url: Option<String>,
    pub api_keys: Vec<String>,
}

impl EnvironmentConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup(PORT_VAR).and_then(|raw| match raw.trim().parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!("Invalid {} environment variable: {}", PORT_VAR, raw);
                None
            }
        });

        Self {
            port,
            upstream_base_url: non_blank(&lookup, UPSTREAM_URL_VAR),
            api_keys: load_api_keys_with(&lookup),
        }
    }

    pub fn has_overrides(&self) -> bool {
        self.port.is_some() || self.upstream_base_url.is_some() || !self.api_keys.is_empty()
    }

    /// Names of the settings that came from the environment.
    pub fn override_summary(&self) -> Vec<String> {
        let mut overrides = Vec::new();
        if self.port.is_some() {
            overrides.push(PORT_VAR.to_string());
        }
        if self.upstream_base_url.is_some() {
            overrides.push(UPSTREAM_URL_VAR.to_string());
        }
        if !self.api_keys.is_empty() {
            overrides.push(format!("{API_KEY_VAR}*"));
        }
        overrides
    }

    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            info!("Overriding server port from environment variable: {}", port);
            config.server.port = port;
        }
        if let Some(url) = &self.upstream_base_url {
            info!("Overriding upstream base URL from environment variable");
            config.upstream.base_url = url.clone();
        }
        if !self.api_keys.is_empty() {
            if !config.api_keys.is_empty() {
                info!(
                    file_keys = config.api_keys.len(),
                    env_keys = self.api_keys.len(),
                    "API keys from the environment replace those in the config file"
                );
            }
            config.api_keys = self.api_keys.clone();
        }
    }
}

fn non_blank<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Collects API keys in rotation order: the primary key (`SPOONACULAR_API_KEY`,
/// or `SPOONACULAR_API_KEY1`), then slots 2 through 10, then the legacy slot
/// if its value is not already present.
pub fn load_api_keys_with<F>(lookup: &F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys = Vec::new();

    if let Some(primary) =
        non_blank(lookup, API_KEY_VAR).or_else(|| non_blank(lookup, &format!("{API_KEY_VAR}1")))
    {
        keys.push(primary);
    }

    for slot in 2..=MAX_NUMBERED_KEY {
        if let Some(key) = non_blank(lookup, &format!("{API_KEY_VAR}{slot}")) {
            keys.push(key);
        }
    }

    if let Some(legacy) = non_blank(lookup, &format!("{API_KEY_VAR}{LEGACY_KEY_SLOT}")) {
        if !keys.contains(&legacy) {
            keys.push(legacy);
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_environment_config_empty() {
        let config = EnvironmentConfig::from_lookup(lookup_from(&[]));
        assert!(!config.has_overrides());
        assert!(config.override_summary().is_empty());
    }

    #[test]
    fn test_load_api_keys_in_slot_order() {
        let lookup = lookup_from(&[
            ("SPOONACULAR_API_KEY", "primary"),
            ("SPOONACULAR_API_KEY2", "second"),
            ("SPOONACULAR_API_KEY3", "third"),
            ("SPOONACULAR_API_KEY10", "tenth"),
        ]);
        assert_eq!(
            load_api_keys_with(&lookup),
            vec!["primary", "second", "third", "tenth"]
        );
    }

    #[test]
    fn test_slot_one_is_primary_alias() {
        let lookup = lookup_from(&[("SPOONACULAR_API_KEY1", "one"), ("SPOONACULAR_API_KEY2", "two")]);
        assert_eq!(load_api_keys_with(&lookup), vec!["one", "two"]);
    }

    #[test]
    fn test_primary_wins_over_slot_one() {
        let lookup = lookup_from(&[("SPOONACULAR_API_KEY", "p"), ("SPOONACULAR_API_KEY1", "one")]);
        assert_eq!(load_api_keys_with(&lookup), vec!["p"]);
    }

    #[test]
    fn test_legacy_slot_is_not_duplicated() {
        let lookup = lookup_from(&[("SPOONACULAR_API_KEY3", "legacy")]);
        assert_eq!(load_api_keys_with(&lookup), vec!["legacy"]);
    }

    #[test]
    fn test_blank_and_out_of_range_keys_ignored() {
        let lookup = lookup_from(&[
            ("SPOONACULAR_API_KEY", "   "),
            ("SPOONACULAR_API_KEY4", " four "),
            ("SPOONACULAR_API_KEY11", "eleven"),
        ]);
        assert_eq!(load_api_keys_with(&lookup), vec!["four"]);
    }

    #[test]
    fn test_apply_overrides() {
        let env = EnvironmentConfig::from_lookup(lookup_from(&[
            ("PORT", "9090"),
            ("RECIPE_PROXY_UPSTREAM_URL", "http://127.0.0.1:1234"),
            ("SPOONACULAR_API_KEY", "env-key"),
        ]));
        let mut config = AppConfig {
            api_keys: vec!["file-key".to_string()],
            ..AppConfig::default()
        };

        env.apply(&mut config);

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:1234");
        assert_eq!(config.api_keys, vec!["env-key"]);
        let summary = env.override_summary();
        assert!(summary.contains(&"PORT".to_string()));
        assert!(summary.contains(&"SPOONACULAR_API_KEY*".to_string()));
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let env = EnvironmentConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(env.port, None);
    }

    #[test]
    fn test_file_keys_kept_without_env_keys() {
        let env = EnvironmentConfig::from_lookup(lookup_from(&[]));
        let mut config = AppConfig {
            api_keys: vec!["file-key".to_string()],
            ..AppConfig::default()
        };
        env.apply(&mut config);
        assert_eq!(config.api_keys, vec!["file-key"]);
    }
}
