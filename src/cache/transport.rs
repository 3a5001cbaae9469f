//! HTTP transport used by the fetch cache on a miss
//!
//! The cache only needs "send this request, give me the body or an error", so
//! the transport sits behind a small trait. Production code uses
//! [`ReqwestTransport`]; tests plug in fakes that count calls.

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout for the reqwest transport
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while fetching a URL
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout, body read)
    #[error("HTTP request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// A header name or value could not be put on the wire
    #[error("Invalid request header: {name}")]
    InvalidHeader { name: String },
}

impl FetchError {
    /// HTTP status code, when the failure was a non-2xx response
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A request the cache hands to the transport on a miss
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// HTTP method, GET for every provider today
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Extra request headers, name to value
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    /// Creates a plain GET request with no extra headers
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Adds a request header, replacing any previous value for `name`
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Performs network requests on behalf of the cache
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    /// Sends `request` and returns the response body on a 2xx status
    async fn execute(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError>;
}

/// Transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Creates a transport with reqwest's default client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Creates a transport whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);

        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::InvalidHeader { name: name.clone() })?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| FetchError::InvalidHeader { name: name.clone() })?;
            builder = builder.header(header_name, header_value);
        }

        let response = builder.send().await.map_err(|source| FetchError::Request {
            url: request.url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Request {
            url: request.url.clone(),
            source,
        })?;

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_fetch_request_get_has_no_headers() {
        let request = FetchRequest::get("https://example.com/a");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, "https://example.com/a");
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_fetch_request_with_header_replaces_value() {
        let request = FetchRequest::get("https://example.com")
            .with_header("Client-Id", "first")
            .with_header("Client-Id", "second");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.headers.get("Client-Id").map(String::as_str), Some("second"));
    }

    #[tokio::test]
    async fn test_execute_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/emotes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1,2,3]"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new();
        let body = transport
            .execute(&FetchRequest::get(format!("{}/emotes", server.uri())))
            .await
            .expect("request should succeed");

        assert_eq!(body, b"[1,2,3]".to_vec());
    }

    #[tokio::test]
    async fn test_execute_sends_custom_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure"))
            .and(header("Client-Id", "abc"))
            .and(header("Authorization", "Bearer xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::with_timeout(DEFAULT_TIMEOUT).unwrap();
        let request = FetchRequest::get(format!("{}/secure", server.uri()))
            .with_header("Client-Id", "abc")
            .with_header("Authorization", "Bearer xyz");

        let body = transport.execute(&request).await.unwrap();
        assert_eq!(body, b"ok".to_vec());
    }

    #[tokio::test]
    async fn test_execute_maps_non_2xx_to_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new();
        let err = transport
            .execute(&FetchRequest::get(format!("{}/denied", server.uri())))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_header_value() {
        let transport = ReqwestTransport::new();
        let request =
            FetchRequest::get("http://127.0.0.1:9/never").with_header("Authorization", "bad\nvalue");

        let err = transport.execute(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidHeader { ref name } if name == "Authorization"));
    }

    #[tokio::test]
    async fn test_execute_reports_connection_failure() {
        // Port 9 (discard) is closed on test hosts; the connection is refused.
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(2)).unwrap();
        let err = transport
            .execute(&FetchRequest::get("http://127.0.0.1:9/unreachable"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Request { .. }));
        assert_eq!(err.status(), None);
    }
}
