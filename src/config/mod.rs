// src/config/mod.rs

pub mod app;
pub mod environment;
pub mod loader;
pub mod validation;

pub use app::{AppConfig, ExhaustedPolicy, RotationConfig, ServerConfig, UpstreamConfig};
pub use environment::EnvironmentConfig;
pub use loader::{load_config_with, load_config_with_env};
pub use validation::{preview_key, ConfigValidator};
