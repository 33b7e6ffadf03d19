// src/state.rs

use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::error::Result;
use crate::key_manager::KeyManager;
use crate::upstream::ReqwestUpstream;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;
use url::form_urlencoded;

/// Shared state handed to every Axum handler.
pub struct AppState {
    pub key_manager: Arc<KeyManager>,
    base_url: String,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Builds the HTTP client and the key manager from a validated config.
    pub fn new(config: &AppConfig, metrics: Option<PrometheusHandle>) -> Result<Self> {
        info!("Creating shared AppState: initializing HTTP client and KeyManager...");
        let upstream = ReqwestUpstream::from_config(&config.server)?;
        let key_manager =
            KeyManager::from_config(config, Arc::new(upstream), Arc::new(SystemClock))?;
        Ok(Self::with_key_manager(
            Arc::new(key_manager),
            &config.upstream.base_url,
            metrics,
        ))
    }

    pub fn with_key_manager(
        key_manager: Arc<KeyManager>,
        base_url: &str,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            key_manager,
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics,
        }
    }

    pub fn metrics_handle(&self) -> Option<&PrometheusHandle> {
        self.metrics.as_ref()
    }

    /// `base_url + path`, followed by the form-encoded `params` if there are any.
    /// The API key is not part of the result.
    pub fn upstream_url(&self, path: &str, params: &[(&str, String)]) -> String {
        if params.is_empty() {
            return format!("{}{}", self.base_url, path);
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        format!("{}{}?{}", self.base_url, path, query)
    }
}
