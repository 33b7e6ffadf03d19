// src/upstream.rs

use crate::{
    config::ServerConfig,
    error::{AppError, Result, UpstreamFailure},
};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

/// One outbound call, minus the API key.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
        }
    }

    /// Same request aimed at `url`.
    pub fn with_url(&self, url: String) -> Self {
        Self {
            method: self.method.clone(),
            url,
            body: self.body.clone(),
        }
    }
}

/// A successful (2xx) upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub data: Value,
}

/// Sends requests to the recipe API. Non-2xx responses come back as `Err`.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(
        &self,
        request: UpstreamRequest,
    ) -> std::result::Result<UpstreamResponse, UpstreamFailure>;
}

/// `UpstreamClient` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: Client,
}

impl ReqwestUpstream {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the pooled client. No overall request timeout is set unless
    /// `request_timeout_secs` is configured.
    pub fn from_config(server: &ServerConfig) -> Result<Self> {
        let mut builder: ClientBuilder = Client::builder()
            .connect_timeout(Duration::from_secs(server.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)));
        if let Some(secs) = server.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder.build().map_err(|e| {
            error!(error = %e, "Failed to build upstream HTTP client");
            AppError::ClientBuild(e)
        })?;
        info!(
            connect_timeout_secs = server.connect_timeout_secs,
            request_timeout_secs = ?server.request_timeout_secs,
            "Upstream HTTP client created"
        );
        Ok(Self::new(client))
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstream {
    async fn send(
        &self,
        request: UpstreamRequest,
    ) -> std::result::Result<UpstreamResponse, UpstreamFailure> {
        let mut builder = self.client.request(request.method, &request.url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        // The URL carries the key, so it is stripped from transport errors.
        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamFailure::transport(e.without_url().to_string()))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| UpstreamFailure {
            status: Some(status),
            message: format!("Failed to read upstream response body: {}", e.without_url()),
            body: None,
        })?;
        let data = parse_body(&bytes);
        debug!(status = %status, body_len = bytes.len(), "Received upstream response");

        if status.is_success() {
            Ok(UpstreamResponse { status, data })
        } else {
            Err(UpstreamFailure::from_status(status, Some(data)))
        }
    }
}

/// JSON when possible, otherwise the body as a JSON string.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Appends `param=key` to `url`, using `&` if the URL already has a query string.
pub fn append_api_key(url: &str, api_key: &str, param: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    let encoded: String = url::form_urlencoded::byte_serialize(api_key.as_bytes()).collect();
    format!("{url}{separator}{param}={encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_to_url_with_query() {
        assert_eq!(
            append_api_key("https://x/y?foo=1", "K", "apiKey"),
            "https://x/y?foo=1&apiKey=K"
        );
    }

    #[test]
    fn append_to_url_without_query() {
        assert_eq!(
            append_api_key("https://x/y", "K", "apiKey"),
            "https://x/y?apiKey=K"
        );
    }

    #[test]
    fn append_encodes_reserved_characters() {
        assert_eq!(
            append_api_key("https://x/y", "a&b=c", "apiKey"),
            "https://x/y?apiKey=a%26b%3Dc"
        );
    }

    #[test]
    fn append_uses_configured_param_name() {
        assert_eq!(append_api_key("https://x/y", "K", "key"), "https://x/y?key=K");
    }

    #[test]
    fn parse_body_falls_back_to_string() {
        assert_eq!(parse_body(b""), Value::Null);
        assert_eq!(parse_body(br#"{"a":1}"#), serde_json::json!({"a": 1}));
        assert_eq!(parse_body(b"quota used"), Value::String("quota used".into()));
    }

    #[test]
    fn with_url_keeps_method_and_body() {
        let request = UpstreamRequest::post_json("https://x/a", serde_json::json!({"t": 1}));
        let moved = request.with_url("https://x/a?apiKey=K".to_string());
        assert_eq!(moved.method, Method::POST);
        assert_eq!(moved.body, request.body);
        assert_eq!(moved.url, "https://x/a?apiKey=K");
    }
}
