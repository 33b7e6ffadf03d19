//! Common test utilities and fixtures
#![allow(dead_code)]

use recipe_proxy::{
    clock::{Clock, ManualClock},
    config::{AppConfig, ExhaustedPolicy},
    key_manager::KeyManager,
    upstream::ReqwestUpstream,
    AppState,
};
use std::sync::Arc;

/// Test configuration builder
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_keys.push(key.into());
        self
    }

    /// Adds `k0`, `k1`, ... so wiremock matchers can tell the keys apart.
    pub fn with_numbered_keys(mut self, count: usize) -> Self {
        for i in 0..count {
            self.config.api_keys.push(format!("k{i}"));
        }
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.upstream.base_url = url.into();
        self
    }

    pub fn with_exhausted_policy(mut self, policy: ExhaustedPolicy) -> Self {
        self.config.rotation.exhausted_policy = policy;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state wired to a real HTTP client and a controllable clock.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub key_manager: Arc<KeyManager>,
    pub clock: ManualClock,
}

impl TestApp {
    pub fn new(config: &AppConfig) -> Self {
        let clock = ManualClock::default();
        let upstream = ReqwestUpstream::from_config(&config.server).expect("client builds");
        let key_manager = Arc::new(
            KeyManager::from_config(config, Arc::new(upstream), Arc::new(clock.clone()))
                .expect("key manager builds"),
        );
        let state = Arc::new(AppState::with_key_manager(
            key_manager.clone(),
            &config.upstream.base_url,
            None,
        ));
        Self {
            state,
            key_manager,
            clock,
        }
    }

    pub fn router(&self) -> axum::Router {
        recipe_proxy::create_router(self.state.clone())
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}

/// Mock HTTP server for testing upstream services
pub struct MockServer {
    pub server: wiremock::MockServer,
}

impl MockServer {
    pub async fn start() -> Self {
        Self {
            server: wiremock::MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }
}

/// Test utilities for HTTP requests
pub mod http {
    use axum::{body::Body, http::Request};
    use serde_json::Value;

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }
}

/// Test assertions and utilities
pub mod assertions {
    use axum::{body::to_bytes, response::Response};
    use serde_json::Value;

    pub async fn assert_json_response(response: Response, expected_status: u16) -> Value {
        assert_eq!(response.status().as_u16(), expected_status);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).expect("Response body should be valid JSON")
    }

    pub async fn assert_error_response(
        response: Response,
        expected_status: u16,
        error_type: &str,
    ) -> Value {
        let json = assert_json_response(response, expected_status).await;

        assert_eq!(json["success"], Value::Bool(false));
        assert_eq!(
            json["error"]["type"].as_str().unwrap(),
            error_type,
            "Error type mismatch"
        );

        json
    }

    pub async fn assert_success_response(response: Response) -> Value {
        let json = assert_json_response(response, 200).await;
        assert_eq!(json["success"], Value::Bool(true));
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = TestConfigBuilder::new()
            .with_port(8080)
            .with_api_key("test-key")
            .with_numbered_keys(2)
            .build();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.api_keys, vec!["test-key", "k0", "k1"]);
    }

    #[tokio::test]
    async fn test_mock_server() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        assert!(uri.starts_with("http://"));
        assert!(uri.contains("127.0.0.1"));
    }
}
