use crate::config::{self, AppConfig, EnvironmentConfig};
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "recipe-proxy",
    version,
    about = "HTTP proxy for the Spoonacular recipe API with API key rotation",
    long_about = "Forwards recipe queries to the Spoonacular API, attaching an API key server-side and rotating to another key when one is rate limited, out of quota or rejected."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "RECIPE_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server bind address (overrides the config file)
    #[arg(long, env = "RECIPE_PROXY_HOST")]
    pub host: Option<String>,

    /// Server port (overrides the config file and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable JSON logging
    #[arg(long, env = "RECIPE_PROXY_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the proxy server (default)
    Serve,
    /// Load and validate the configuration, then exit
    Check,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from("config.yaml"))
    }

    /// Applies `--host` and `--port` on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }

    /// Loads and validates the configuration with `--host`/`--port` applied.
    pub fn load_config(&self) -> Result<AppConfig> {
        self.load_config_with_env(&EnvironmentConfig::from_env())
    }

    pub fn load_config_with_env(&self, env: &EnvironmentConfig) -> Result<AppConfig> {
        config::load_config_with(&self.config_path(), env, |config| {
            self.apply_overrides(config)
        })
    }
}

/// Summary printed by `recipe-proxy check`. Never includes key material.
pub fn check_summary(config: &AppConfig) -> String {
    format!(
        "Configuration OK: {} API key(s), upstream {}, listening on {}:{}, exhausted policy {:?}",
        config.api_keys.len(),
        config.upstream.base_url,
        config.server.host,
        config.server.port,
        config.rotation.exhausted_policy,
    )
}

pub fn run_check(cli: &Cli) -> Result<String> {
    let config = cli.load_config()?;
    Ok(check_summary(&config))
}
