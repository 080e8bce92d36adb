//! Async request client
//!
//! Issues exactly one HTTP request per call against a resolved API path and
//! settles a [`TransferFuture`] with the raw response. No retry happens at
//! this layer; retry policy belongs to the upload session manager (or to a
//! caller awaiting a simple call).
//!
//! The underlying `reqwest::Client` is constructed by the embedding
//! application and passed in explicitly: it owns the process-wide connection
//! pool shared by all transfers and outlives any single one of them.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Method;
use tracing::debug;

use odrive_core::{ApiError, TransferConfig, TransferFuture};

use crate::classify::transport_error;

/// A fully-buffered HTTP response.
///
/// Metadata-sized responses are buffered whole; the download pipeline
/// bypasses this type and streams instead.
#[derive(Debug)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Parses the `Retry-After` header as a whole-seconds delay, if present.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Value of a response header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP client for the drive API.
///
/// Wraps a shared `reqwest::Client` with base URL construction, bearer
/// authentication, and a per-request deadline.
#[derive(Clone)]
pub struct ApiClient {
    /// Shared connection pool, constructed and owned by the caller
    http: reqwest::Client,
    /// Base URL prepended to relative API paths
    base_url: String,
    /// OAuth2 bearer token
    access_token: String,
    /// Deadline applied to every request
    timeout: Duration,
}

impl ApiClient {
    /// Creates a client from an explicit connection-pool context.
    pub fn new(
        http: reqwest::Client,
        access_token: impl Into<String>,
        config: &TransferConfig,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            access_token: access_token.into(),
            timeout: config.request_timeout,
        }
    }

    /// Creates a client with a custom base URL (useful for tests).
    pub fn with_base_url(
        http: reqwest::Client,
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            access_token: access_token.into(),
            timeout: odrive_core::config::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The per-request deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The underlying shared HTTP client.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The bearer token sent with every request.
    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Builds the absolute URL for a relative API path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Performs one request against an absolute URL and buffers the response.
    ///
    /// This is the single point all request paths go through: exactly one
    /// network request, one deadline, no retry.
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, ApiError> {
        debug!(%method, url, "issuing request");

        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(&self.access_token)
            .timeout(self.timeout);

        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, self.timeout))?
            .to_vec();

        debug!(status, bytes = body.len(), "response received");
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    /// Performs one request against a relative API path.
    pub async fn send_once(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url_for(path);
        self.execute(method, &url, headers, body).await
    }

    /// Issues one request and returns a future of the raw response.
    ///
    /// The request runs on the shared runtime; independent calls may be
    /// issued concurrently and may complete out of order. Must be called
    /// from within a tokio runtime context.
    pub fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> TransferFuture<RawResponse> {
        let (promise, future) = TransferFuture::pending();

        let client = self.clone();
        let path = path.to_string();
        let headers: Vec<(String, String)> = headers
            .iter()
            .map(|(n, v)| (n.to_string(), v.clone()))
            .collect();

        tokio::spawn(async move {
            let borrowed: Vec<(&str, String)> = headers
                .iter()
                .map(|(n, v)| (n.as_str(), v.clone()))
                .collect();
            let result = client.send_once(method, &path, &borrowed, body).await;
            promise.settle(result);
        });

        future
    }
}
