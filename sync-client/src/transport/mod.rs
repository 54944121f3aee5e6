//! Transport abstraction for spacesync.
//!
//! This module provides a pluggable request/response layer that abstracts
//! the underlying HTTP client (reqwest, or an in-memory mock for testing).
//!
//! # Design
//!
//! The transport trait is async and stateless per call:
//! - `request()` sends one [`ApiRequest`] and waits up to its timeout
//! - a 2xx answer becomes an [`ApiResponse`]
//! - anything else becomes a typed [`TransportError`]
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! let response = transport.request(ApiRequest::get("/spaces")).await?;
//! let spaces: Vec<SpaceHandle> = response.json()?;
//! ```

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{IdempotencyMode, MockReply, MockTransport};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The call exceeded its timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the body.
        message: String,
        /// Raw JSON body, `Null` if empty.
        body: serde_json::Value,
    },

    /// The response body could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout => true,
            Self::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::Decode(_) => false,
        }
    }

    /// Whether the service reported a conflict (409).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
    }

    /// HTTP status, if the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// One request to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the service base URL, starting with `/`.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Value of the `Idempotency-Key` header, if any.
    pub idempotency_key: Option<String>,
    /// JSON body.
    pub body: Option<serde_json::Value>,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl ApiRequest {
    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            idempotency_key: None,
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(path)
        }
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach an idempotency key.
    pub fn with_idempotency_key(mut self, key: &str) -> Self {
        self.idempotency_key = Some(key.to_string());
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Look up a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status (2xx).
    pub status: u16,
    /// JSON body, `Null` if empty.
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Turn a raw status and body into a response or a typed failure.
    pub fn from_parts(status: u16, body: serde_json::Value) -> Result<Self, TransportError> {
        if (200..300).contains(&status) {
            return Ok(Self { status, body });
        }

        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .map(str::to_string)
            .or_else(|| body.as_str().map(str::to_string))
            .unwrap_or_else(|| "no details".to_string());

        Err(TransportError::Status {
            status,
            message,
            body,
        })
    }

    /// Decode the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_value(self.body.clone()).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Transport trait for issuing requests to the space service.
///
/// Implementations handle the underlying connection mechanism
/// (reqwest HTTP, in-memory mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its response, up to `request.timeout`.
    ///
    /// Non-success statuses are returned as [`TransportError::Status`].
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_status_is_ok() {
        let response = ApiResponse::from_parts(201, json!({"id": "x"})).unwrap();
        assert_eq!(response.status, 201);
    }

    #[test]
    fn error_status_extracts_message() {
        let err = ApiResponse::from_parts(409, json!({"error": "version mismatch"})).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "service returned 409: version mismatch");
    }

    #[test]
    fn error_status_with_text_body() {
        let err = ApiResponse::from_parts(502, json!("bad gateway")).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::ConnectionFailed("refused".into()).is_retryable());
        assert!(!TransportError::Decode("bad".into()).is_retryable());
        assert!(!ApiResponse::from_parts(404, serde_json::Value::Null)
            .unwrap_err()
            .is_retryable());
        assert!(ApiResponse::from_parts(429, serde_json::Value::Null)
            .unwrap_err()
            .is_retryable());
    }

    #[test]
    fn request_builders() {
        let req = ApiRequest::get("/spaces")
            .with_query("name", "demo")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.query_param("name"), Some("demo"));
        assert_eq!(req.timeout, Duration::from_secs(5));

        let req = ApiRequest::post("/spaces", json!({"name": "demo"})).with_idempotency_key("k");
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.idempotency_key.as_deref(), Some("k"));
        assert_eq!(req.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn decode_failure_is_typed() {
        let response = ApiResponse::from_parts(200, json!({"unexpected": true})).unwrap();
        let result: Result<spacesync_types::SpaceHandle, _> = response.json();
        assert!(matches!(result, Err(TransportError::Decode(_))));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TransportError>();
    }
}
