// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Structured error body returned to clients.
#[derive(Serialize, Debug)]
struct ErrorResponse {
    success: bool,
    error: ErrorDetails,
}

/// Error details embedded in the response body.
#[derive(Serialize, Debug)]
struct ErrorDetails {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ErrorDetails {
    fn new(error_type: &str, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error_type: error_type.to_string(),
            message: message.into(),
            details,
        }
    }
}

/// How a failed upstream attempt affects the key that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 402 Payment Required: the daily quota of the key is spent.
    QuotaExhausted,
    /// 429 Too Many Requests.
    RateLimited,
    /// 401 or 403: the key is rejected outright.
    Unauthorized,
    /// Any other status, or a transport error with no status at all.
    Other,
}

impl FailureClass {
    pub fn from_status(status: Option<StatusCode>) -> Self {
        match status.map(|s| s.as_u16()) {
            Some(402) => Self::QuotaExhausted,
            Some(429) => Self::RateLimited,
            Some(401 | 403) => Self::Unauthorized,
            _ => Self::Other,
        }
    }

    /// 402 and 429 always move the executor to another key, even on the last attempt.
    pub fn is_rate_limit(self) -> bool {
        matches!(self, Self::QuotaExhausted | Self::RateLimited)
    }
}

/// A single failed request to the recipe API.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct UpstreamFailure {
    /// `None` when the request never produced a response (DNS, connect, timeout).
    pub status: Option<StatusCode>,
    pub message: String,
    /// Parsed error body from the upstream, when it sent one.
    pub body: Option<serde_json::Value>,
}

impl UpstreamFailure {
    pub fn from_status(status: StatusCode, body: Option<serde_json::Value>) -> Self {
        Self {
            status: Some(status),
            message: format!("Request failed with status code {}", status.as_u16()),
            body,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    pub fn class(&self) -> FailureClass {
        FailureClass::from_status(self.status)
    }
}

/// Errors that can occur anywhere in the proxy.
///
/// Implements `IntoResponse`, so handlers can return them directly and the
/// client gets a uniform JSON body.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client setup failed: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlParsing(#[from] serde_yaml::Error),

    #[error("No available API keys")]
    NoAvailableKeys,

    #[error("All {attempts} attempt(s) against the upstream failed; last error: {last}")]
    CredentialsExhausted {
        attempts: usize,
        #[source]
        last: UpstreamFailure,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps the error to the status code and body details sent to the client.
    fn to_status_and_details(&self) -> (StatusCode, ErrorDetails) {
        match self {
            // Startup failures. They only reach a client if a handler hits one.
            Self::Config(_) | Self::ClientBuild(_) | Self::Io(_) | Self::YamlParsing(_) => {
                error!(error = %self, "Request failed on a setup error");
                let error_type = match self {
                    Self::Config(_) => "CONFIG_ERROR",
                    Self::YamlParsing(_) => "CONFIG_PARSE_ERROR",
                    Self::Io(_) => "IO_ERROR",
                    _ => "CLIENT_ERROR",
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails::new(error_type, "Internal server configuration error", None),
                )
            }
            Self::Internal(msg) => {
                error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails::new(
                        "INTERNAL_SERVER_ERROR",
                        "An unexpected internal server error occurred",
                        None,
                    ),
                )
            }
            // Logged by the executor when it gives up.
            Self::CredentialsExhausted { last, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetails::new(
                    "UPSTREAM_REQUEST_FAILED",
                    "Internal Server Error",
                    Some(last.message.clone()),
                ),
            ),
            Self::NoAvailableKeys => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetails::new(
                    "NO_AVAILABLE_KEYS",
                    "No available API keys to process the request at this time",
                    None,
                ),
            ),
            Self::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetails::new(
                    "INVALID_REQUEST",
                    "The request could not be processed",
                    Some(msg.clone()),
                ),
            ),
            Self::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetails::new("NOT_FOUND", format!("Resource not found: {resource}"), None),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_details) = self.to_status_and_details();

        let body = Json(ErrorResponse {
            success: false,
            error: error_details,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;
    use std::io;

    async fn check_response(
        error: AppError,
        expected_status: StatusCode,
        expected_type: &str,
        expected_message_substring: &str,
        expect_details: bool,
    ) -> Value {
        let response = error.into_response();
        assert_eq!(response.status(), expected_status, "Status code mismatch");

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        let body_json: Value = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            panic!(
                "Response body is not valid JSON: {}. Body: {}",
                e,
                String::from_utf8_lossy(&bytes)
            )
        });

        assert_eq!(body_json["success"], Value::Bool(false));

        let error_obj = &body_json["error"];
        assert!(!error_obj.is_null(), "JSON 'error' field is missing");
        assert_eq!(error_obj["type"], expected_type, "Error type mismatch");

        let error_msg = error_obj["message"]
            .as_str()
            .expect("JSON 'error.message' field is not a string or missing");
        assert!(
            error_msg.contains(expected_message_substring),
            "Expected message '{error_msg}' to contain '{expected_message_substring}'"
        );

        assert_eq!(
            error_obj["details"].is_string(),
            expect_details,
            "Unexpected presence of 'error.details': {body_json}"
        );
        body_json
    }

    #[tokio::test]
    async fn test_into_response_config() {
        check_response(
            AppError::Config("No API keys configured".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "CONFIG_ERROR",
            "Internal server configuration error",
            false,
        )
        .await;
    }

    #[tokio::test]
    async fn test_into_response_io() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        check_response(
            AppError::Io(io_error),
            StatusCode::INTERNAL_SERVER_ERROR,
            "IO_ERROR",
            "configuration error",
            false,
        )
        .await;
    }

    #[tokio::test]
    async fn test_into_response_yaml() {
        let yaml_error: serde_yaml::Error =
            serde_yaml::from_str::<()>("invalid: yaml:").unwrap_err();
        check_response(
            AppError::YamlParsing(yaml_error),
            StatusCode::INTERNAL_SERVER_ERROR,
            "CONFIG_PARSE_ERROR",
            "configuration error",
            false,
        )
        .await;
    }

    #[tokio::test]
    async fn test_into_response_no_keys() {
        check_response(
            AppError::NoAvailableKeys,
            StatusCode::SERVICE_UNAVAILABLE,
            "NO_AVAILABLE_KEYS",
            "No available API keys",
            false,
        )
        .await;
    }

    #[tokio::test]
    async fn test_into_response_credentials_exhausted_carries_last_error() {
        let last = UpstreamFailure::from_status(StatusCode::INTERNAL_SERVER_ERROR, None);
        let body = check_response(
            AppError::CredentialsExhausted { attempts: 3, last },
            StatusCode::INTERNAL_SERVER_ERROR,
            "UPSTREAM_REQUEST_FAILED",
            "Internal Server Error",
            true,
        )
        .await;
        assert_eq!(
            body["error"]["details"],
            "Request failed with status code 500"
        );
    }

    #[tokio::test]
    async fn test_into_response_invalid_request() {
        check_response(
            AppError::InvalidRequest("missing 'food'".to_string()),
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            "could not be processed",
            true,
        )
        .await;
    }

    #[tokio::test]
    async fn test_into_response_internal() {
        check_response(
            AppError::Internal("Something went wrong".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "unexpected internal server error",
            false,
        )
        .await;
    }

    #[test]
    fn test_failure_classification() {
        let class = |code: u16| FailureClass::from_status(StatusCode::from_u16(code).ok());
        assert_eq!(class(402), FailureClass::QuotaExhausted);
        assert_eq!(class(429), FailureClass::RateLimited);
        assert_eq!(class(401), FailureClass::Unauthorized);
        assert_eq!(class(403), FailureClass::Unauthorized);
        assert_eq!(class(500), FailureClass::Other);
        assert_eq!(class(404), FailureClass::Other);
        assert_eq!(FailureClass::from_status(None), FailureClass::Other);

        assert!(FailureClass::QuotaExhausted.is_rate_limit());
        assert!(FailureClass::RateLimited.is_rate_limit());
        assert!(!FailureClass::Unauthorized.is_rate_limit());
        assert!(!FailureClass::Other.is_rate_limit());
    }

    #[test]
    fn test_transport_failure_has_no_status() {
        let failure = UpstreamFailure::transport("connection refused");
        assert!(failure.status.is_none());
        assert_eq!(failure.class(), FailureClass::Other);
        assert_eq!(failure.to_string(), "connection refused");
    }
}
