// src/handlers/mod.rs

pub mod recipes;
pub mod system;

pub use recipes::recipe_routes;
pub use system::{api_status, health_check, metrics_handler, not_found, welcome};

use crate::upstream::UpstreamResponse;
use axum::Json;
use serde::Serialize;

/// Body of every successful `/api/recipes` response.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

pub(crate) fn relay(response: UpstreamResponse) -> Json<ApiResponse<serde_json::Value>> {
    ApiResponse::ok(response.data)
}
