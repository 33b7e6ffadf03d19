// src/handlers/system.rs

use super::ApiResponse;
use crate::{error::AppError, key_manager::PoolStatus, state::AppState};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub async fn welcome() -> &'static str {
    "Welcome to the Recipe Finder API"
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Prometheus text exposition, or 404 when no recorder was installed.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => AppError::NotFound("/metrics".to_string()).into_response(),
    }
}

pub async fn api_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<PoolStatus>> {
    let status = state.key_manager.status().await;
    debug!(
        total_keys = status.total_keys,
        current_key_index = status.current_key_index,
        "Reporting API key status"
    );
    ApiResponse::ok(status)
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
