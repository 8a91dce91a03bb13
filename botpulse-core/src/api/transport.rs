//! The `GET` capability the probe and fetcher are built on.
//!
//! Production code uses [`ReqwestTransport`]; tests swap in scripted
//! transports through the [`HttpTransport`] trait.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::ApiConfig;
use crate::error::{Error, FetchError, Result};

/// Status and raw body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON, `None` if it is empty or malformed
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Issues a single GET. Transport failures map to [`FetchError::Network`];
/// any HTTP status, including errors, is a successful transport result.
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, FetchError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with the configured timeout and JSON default headers
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, FetchError> {
        let response = self.client.get(url).send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(network_error)?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn network_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Network("Network error: request timed out".to_string())
    } else if err.is_connect() {
        FetchError::Network(format!("Network error: connection failed ({})", err))
    } else {
        FetchError::Network(format!("Network error: {}", err))
    }
}
