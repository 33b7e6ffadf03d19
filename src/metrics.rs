// src/metrics.rs

use crate::error::{AppError, Result};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Installs the global Prometheus recorder. Call once per process.
pub fn initialize_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Internal(format!("failed to install Prometheus recorder: {e}")))
}

pub fn record_request_start() {
    gauge!("recipe_proxy_requests_in_flight").increment(1.0);
}

pub fn record_request_end(start_time: Instant, status_code: u16) {
    let duration = start_time.elapsed().as_secs_f64();
    gauge!("recipe_proxy_requests_in_flight").decrement(1.0);
    counter!("recipe_proxy_requests_total", "status" => status_code.to_string()).increment(1);
    histogram!("recipe_proxy_request_duration_seconds", "status" => status_code.to_string())
        .record(duration);
}

/// `outcome` is `success` or `failure`.
pub fn record_upstream_attempt(outcome: &'static str) {
    counter!("recipe_proxy_upstream_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_key_failure(status_code: Option<u16>) {
    let status = status_code.map_or_else(|| "network".to_string(), |code| code.to_string());
    counter!("recipe_proxy_key_failures_total", "status" => status).increment(1);
}

/// `result` is `rotated`, `fallback` or `exhausted`.
pub fn record_rotation(result: &'static str) {
    counter!("recipe_proxy_key_rotations_total", "result" => result).increment(1);
}

pub fn record_credentials_exhausted() {
    counter!("recipe_proxy_credentials_exhausted_total").increment(1);
}

pub fn set_keys_available(count: usize) {
    gauge!("recipe_proxy_keys_available").set(count as f64);
}
