//! HTTP transport seam.
//!
//! The client never calls `reqwest` directly; it goes through
//! [`GraphTransport`], so tests and alternative hosts can substitute their own
//! implementation. Status handling lives in the caller: a transport only
//! fails when no HTTP response was obtained at all.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::{debug, warn};

use crate::GraphError;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP surface the client needs.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// GET `url` with a bearer `Authorization` header.
    async fn get(&self, url: &str, bearer_token: &str) -> Result<HttpReply, GraphError>;

    /// POST a form-encoded body to `url`.
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, GraphError>;
}

/// [`GraphTransport`] backed by a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Builds a client with JSON `Accept`, a fixed User-Agent and a request timeout.
    pub fn new(timeout: Duration) -> Result<Self, GraphError> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .user_agent(format!("intake/{}; {}", env!("CARGO_PKG_VERSION"), std::env::consts::OS))
            .timeout(timeout)
            .build()
            .map_err(|error| GraphError::invalid_config("http client", error.to_string()))?;
        Ok(Self { http })
    }

    async fn complete(request: reqwest::RequestBuilder, method: &str, url: &str) -> Result<HttpReply, GraphError> {
        let start = Instant::now();
        debug!(method, url, "http request started");

        let response = request.send().await.map_err(|error| {
            warn!(
                method,
                url,
                timed_out = error.is_timeout(),
                duration_ms = start.elapsed().as_millis(),
                "http request failed"
            );
            let message = if error.is_timeout() {
                format!("timed out: {error}")
            } else {
                format!("network error: {error}")
            };
            GraphError::transport(url, None, message)
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| GraphError::transport(url, Some(status), format!("could not read response body: {error}")))?;
        debug!(
            method,
            url,
            status,
            body_len = body.len(),
            duration_ms = start.elapsed().as_millis(),
            "http request completed"
        );
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl GraphTransport for ReqwestTransport {
    async fn get(&self, url: &str, bearer_token: &str) -> Result<HttpReply, GraphError> {
        let request = self.http.get(url).bearer_auth(bearer_token);
        Self::complete(request, "GET", url).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, GraphError> {
        let request = self.http.post(url).form(form);
        Self::complete(request, "POST", url).await
    }
}
