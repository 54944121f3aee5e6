//! HttpTransport - JSON over HTTP using reqwest.
//!
//! Every request carries the static API key header and a JSON content type.
//! Timeouts are applied per call from [`ApiRequest::timeout`].

use super::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the idempotency key of creation requests.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Connect timeout applied to every call.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HttpTransport implements the Transport trait over reqwest.
///
/// # Example
///
/// ```ignore
/// let transport = HttpTransport::new("https://spaces.example.com/api", "key")?;
/// let response = transport.request(ApiRequest::get("/spaces")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the given base URL and API key.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| TransportError::ConnectionFailed(format!("invalid API key: {}", e)))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the absolute URL for a request path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::ConnectionFailed(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path);
        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };

        builder = builder.timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!("{} {}", request.method, request.path);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };

        ApiResponse::from_parts(status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let transport = HttpTransport::new("http://localhost:8080/api/", "key").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080/api");
        assert_eq!(
            transport.url_for("/spaces"),
            "http://localhost:8080/api/spaces"
        );
    }

    #[test]
    fn invalid_api_key_rejected() {
        let result = HttpTransport::new("http://localhost", "bad\nkey");
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn unreachable_service_is_retryable() {
        // Port 9 (discard) on localhost is essentially never listening for HTTP.
        let transport = HttpTransport::new("http://127.0.0.1:9", "key").unwrap();
        let err = transport
            .request(ApiRequest::get("/spaces").with_timeout(std::time::Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }
}
