use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{ClientCredentials, GraphError, GraphTransport, ReqwestTransport, TokenProvider};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Hostnames allowed over plain HTTP for local development.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Endpoints and limits for a [`GraphClient`].
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub base_url: String,
    pub authority_url: String,
    pub scope: String,
    pub token_safety_margin: Duration,
    pub request_timeout: Duration,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            token_safety_margin: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Authenticated client for the directory/list service.
///
/// Cloning is cheap and clones share the token cache.
#[derive(Clone)]
pub struct GraphClient {
    base_url: String,
    transport: Arc<dyn GraphTransport>,
    tokens: Arc<TokenProvider>,
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl GraphClient {
    /// Builds a client over the default `reqwest` transport.
    pub fn new(settings: GraphSettings, credentials: ClientCredentials) -> Result<Self, GraphError> {
        let transport = ReqwestTransport::new(settings.request_timeout)?;
        Self::with_transport(settings, credentials, Arc::new(transport))
    }

    /// Builds a client over any [`GraphTransport`].
    pub fn with_transport(
        settings: GraphSettings,
        credentials: ClientCredentials,
        transport: Arc<dyn GraphTransport>,
    ) -> Result<Self, GraphError> {
        validate_base_url("baseUrl", &settings.base_url)?;
        validate_base_url("authorityUrl", &settings.authority_url)?;

        let tokens = TokenProvider::new(
            Arc::clone(&transport),
            credentials,
            &settings.authority_url,
            settings.scope,
            settings.token_safety_margin,
        );
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            transport,
            tokens: Arc::new(tokens),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    /// Absolute URL for an API-relative path.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GETs `url` with a bearer token and parses the JSON body.
    ///
    /// A 401 invalidates the cached token so the next invocation re-acquires
    /// one; the current call still fails.
    pub(crate) async fn get_json(&self, url: &str) -> Result<Value, GraphError> {
        let start = Instant::now();
        let token = self.tokens.get_token().await?;
        let reply = self.transport.get(url, &token).await?;

        if reply.status == 401 {
            self.tokens.invalidate().await;
        }
        if !reply.is_success() {
            warn!(
                url,
                status = reply.status,
                duration_ms = start.elapsed().as_millis(),
                "directory request failed"
            );
            return Err(GraphError::transport(
                url,
                Some(reply.status),
                intake_util::truncate_for_log(&intake_util::redact_sensitive(&reply.body), 200),
            ));
        }

        let parsed = serde_json::from_str::<Value>(&reply.body)
            .map_err(|error| GraphError::transport(url, Some(reply.status), format!("invalid JSON response: {error}")))?;
        debug!(
            url,
            status = reply.status,
            duration_ms = start.elapsed().as_millis(),
            "directory request completed"
        );
        Ok(parsed)
    }
}

/// Percent-encodes one URL path segment.
pub(crate) fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Percent-encodes a `/`-separated path, keeping the separators and a single
/// leading slash.
pub(crate) fn encode_path(path: &str) -> String {
    let encoded: Vec<String> = path
        .trim()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(encode_segment)
        .collect();
    format!("/{}", encoded.join("/"))
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS
fn validate_base_url(field: &'static str, base: &str) -> Result<(), GraphError> {
    let parsed = Url::parse(base).map_err(|error| GraphError::invalid_config(field, format!("'{base}' is not a URL: {error}")))?;
    let host_name = parsed
        .host_str()
        .ok_or_else(|| GraphError::invalid_config(field, format!("'{base}' must include a host")))?;

    if LOCALHOST_DOMAINS.iter().any(|&allowed| host_name.eq_ignore_ascii_case(allowed)) {
        return Ok(());
    }
    if parsed.scheme() != "https" {
        return Err(GraphError::invalid_config(
            field,
            format!("must use https for non-localhost hosts; got '{}://'", parsed.scheme()),
        ));
    }
    Ok(())
}
