// src/lib.rs

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod key_manager;
pub mod key_state;
pub mod metrics;
pub mod state;
pub mod upstream;

use crate::cli::Cli;
use crate::handlers::{health_check, metrics_handler, not_found, recipe_routes, welcome};
use axum::{
    body::Body,
    http::{HeaderValue, Request as AxumRequest},
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{sync::Arc, time::Instant};
use tower_http::cors::CorsLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use key_manager::KeyManager;
pub use state::AppState;

/// Builds the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/recipes", recipe_routes())
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Adds a request id and a span around every request.
pub async fn trace_requests(
    mut req: AxumRequest<Body>,
    next: axum::middleware::Next,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %method,
        url.path = %path,
    );

    req.extensions_mut().insert(request_id);

    async move {
        metrics::record_request_start();
        let mut response = next.run(req).await;
        let elapsed = start_time.elapsed();
        metrics::record_request_end(start_time, response.status().as_u16());

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("X-Request-ID", value);
        }

        info!(
            http.response.duration = ?elapsed,
            http.status_code = response.status().as_u16(),
            "Finished processing request"
        );

        response
    }
    .instrument(span)
    .await
}

/// Loads configuration, builds the shared state and returns the ready router.
pub async fn run(cli: &Cli, metrics: Option<PrometheusHandle>) -> Result<(Router, AppConfig)> {
    info!("Starting Recipe API Key Rotation Proxy...");

    let app_config = setup_configuration(cli)?;
    let app_state = build_application_state(&app_config, metrics)?;

    let app = create_router(app_state).layer(axum::middleware::from_fn(trace_requests));

    Ok((app, app_config))
}

fn setup_configuration(cli: &Cli) -> Result<AppConfig> {
    let config_path = cli.config_path();

    let config_path_display = config_path.display().to_string();
    if config_path.exists() {
        info!(config.path = %config_path_display, "Using configuration file");
    } else {
        info!(config.path = %config_path_display, "Optional configuration file not found. Using defaults and environment variables.");
    }

    let app_config = cli.load_config().map_err(|e| {
        error!(
            config.path = %config_path_display,
            error = ?e,
            "Failed to load or validate configuration. Exiting."
        );
        e
    })?;

    info!(
        config.total_keys = app_config.api_keys.len(),
        config.upstream = %app_config.upstream.base_url,
        config.exhausted_policy = ?app_config.rotation.exhausted_policy,
        server.port = app_config.server.port,
        "Configuration loaded and validated successfully."
    );

    Ok(app_config)
}

fn build_application_state(
    app_config: &AppConfig,
    metrics: Option<PrometheusHandle>,
) -> Result<Arc<AppState>> {
    let app_state = AppState::new(app_config, metrics).map_err(|e| {
        error!(error = ?e, "Failed to initialize application state. Exiting.");
        e
    })?;
    info!("Application state initialized successfully.");
    Ok(Arc::new(app_state))
}
