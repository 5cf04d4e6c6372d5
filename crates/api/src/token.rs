//! Bearer credential acquisition and caching.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::encode_segment;
use crate::{GraphError, GraphTransport};

/// Tenant and application identity used for the client-credentials exchange.
#[derive(Clone)]
pub struct ClientCredentials {
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    /// Validates that every part of the identity is a non-empty string.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, GraphError> {
        let tenant_id = required("tenantId", tenant_id.into())?;
        let client_id = required("clientId", client_id.into())?;
        let client_secret = required("clientSecret", client_secret.into())?;
        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

fn required(field: &'static str, value: String) -> Result<String, GraphError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GraphError::invalid_config(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// An access token and the instant it stops being valid.
#[derive(Clone)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Instant,
}

impl Credential {
    /// True while more than `margin` remains before expiry.
    pub fn is_fresh(&self, margin: Duration, now: Instant) -> bool {
        self.expires_at.saturating_duration_since(now) > margin
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<Value>,
}

/// Acquires bearer tokens through the client-credentials grant and caches
/// them until they come within the safety margin of expiry.
///
/// The cache lock is held across the exchange, so concurrent callers share a
/// single exchange. Failures are not retried here.
pub struct TokenProvider {
    transport: Arc<dyn GraphTransport>,
    credentials: ClientCredentials,
    token_url: String,
    scope: String,
    safety_margin: Duration,
    cached: Mutex<Option<Credential>>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .field("safety_margin", &self.safety_margin)
            .finish()
    }
}

impl TokenProvider {
    pub fn new(
        transport: Arc<dyn GraphTransport>,
        credentials: ClientCredentials,
        authority_url: &str,
        scope: impl Into<String>,
        safety_margin: Duration,
    ) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority_url.trim_end_matches('/'),
            encode_segment(credentials.tenant_id())
        );
        Self {
            transport,
            credentials,
            token_url,
            scope: scope.into(),
            safety_margin,
            cached: Mutex::new(None),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns a token with more than the safety margin of lifetime left,
    /// exchanging credentials only when the cached one is missing or stale.
    pub async fn get_token(&self) -> Result<String, GraphError> {
        let mut cached = self.cached.lock().await;
        if let Some(credential) = cached.as_ref()
            && credential.is_fresh(self.safety_margin, Instant::now())
        {
            debug!("token cache hit");
            return Ok(credential.access_token.clone());
        }

        let credential = self.exchange().await?;
        let access_token = credential.access_token.clone();
        *cached = Some(credential);
        Ok(access_token)
    }

    /// Drops the cached credential; the next [`get_token`](Self::get_token)
    /// performs a fresh exchange.
    pub async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            info!("cached token invalidated");
        }
    }

    async fn exchange(&self) -> Result<Credential, GraphError> {
        debug!(token_url = %self.token_url, client_id = %self.credentials.client_id, "token exchange started");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let requested_at = Instant::now();
        let reply = self.transport.post_form(&self.token_url, &form).await?;

        if !reply.is_success() {
            warn!(status = reply.status, "token exchange rejected");
            return Err(GraphError::auth(format!(
                "token endpoint returned HTTP {}: {}",
                reply.status,
                intake_util::truncate_for_log(&intake_util::redact_sensitive(&reply.body), 200)
            )));
        }

        let response: TokenResponse = serde_json::from_str(&reply.body)
            .map_err(|error| GraphError::auth(format!("token response is not valid JSON: {error}")))?;
        let access_token = response
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| GraphError::auth("token response is missing 'access_token'"))?;
        let lifetime = response
            .expires_in
            .as_ref()
            .and_then(parse_lifetime)
            .ok_or_else(|| GraphError::auth("token response is missing a numeric 'expires_in'"))?;
        if lifetime <= self.safety_margin {
            return Err(GraphError::auth(format!(
                "token lifetime of {}s does not exceed the {}s safety margin",
                lifetime.as_secs(),
                self.safety_margin.as_secs()
            )));
        }

        info!(expires_in_secs = lifetime.as_secs(), "token acquired");
        Ok(Credential {
            access_token,
            expires_at: requested_at + lifetime,
        })
    }
}

fn parse_lifetime(value: &Value) -> Option<Duration> {
    let seconds = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    const AUTHORITY: &str = "https://login.test";
    const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

    fn provider(transport: &Arc<ScriptedTransport>) -> TokenProvider {
        let credentials = ClientCredentials::new("tenant-1", "client-1", "secret-1").expect("valid credentials");
        TokenProvider::new(
            transport.clone(),
            credentials,
            AUTHORITY,
            "https://graph.test/.default",
            Duration::from_secs(60),
        )
    }

    async fn seed(provider: &TokenProvider, token: &str, remaining: Duration) {
        *provider.cached.lock().await = Some(Credential {
            access_token: token.to_string(),
            expires_at: Instant::now() + remaining,
        });
    }

    #[test]
    fn credentials_reject_empty_parts() {
        assert!(matches!(
            ClientCredentials::new("tenant", " ", "secret"),
            Err(GraphError::InvalidConfig { field: "clientId", .. })
        ));
        assert!(ClientCredentials::new("", "client", "secret").is_err());
        assert!(ClientCredentials::new("tenant", "client", "").is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let credentials = ClientCredentials::new("tenant", "client", "super-secret").expect("valid credentials");
        assert!(!format!("{credentials:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn exchange_posts_client_credentials_form() {
        let transport = Arc::new(ScriptedTransport::new().on_post(
            TOKEN_PATH,
            200,
            r#"{"token_type":"Bearer","expires_in":3599,"access_token":"tok-1"}"#,
        ));
        let provider = provider(&transport);

        assert_eq!(provider.get_token().await.expect("token"), "tok-1");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://login.test/tenant-1/oauth2/v2.0/token");
        assert_eq!(requests[0].form_value("grant_type"), Some("client_credentials"));
        assert_eq!(requests[0].form_value("client_id"), Some("client-1"));
        assert_eq!(requests[0].form_value("client_secret"), Some("secret-1"));
        assert_eq!(requests[0].form_value("scope"), Some("https://graph.test/.default"));
    }

    #[tokio::test]
    async fn fresh_credential_is_served_without_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let provider = provider(&transport);
        seed(&provider, "cached", Duration::from_secs(600)).await;

        assert_eq!(provider.get_token().await.expect("token"), "cached");
        assert_eq!(provider.get_token().await.expect("token"), "cached");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn credential_within_safety_margin_is_reacquired() {
        let transport = Arc::new(ScriptedTransport::new().on_post(TOKEN_PATH, 200, r#"{"access_token":"renewed","expires_in":"3600"}"#));
        let provider = provider(&transport);
        seed(&provider, "stale", Duration::from_secs(30)).await;

        assert_eq!(provider.get_token().await.expect("token"), "renewed");
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(provider.get_token().await.expect("token"), "renewed");
        assert_eq!(transport.requests().len(), 1, "renewed credential is cached");
    }

    #[tokio::test]
    async fn invalidate_forces_a_new_exchange() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_post(TOKEN_PATH, 200, r#"{"access_token":"first","expires_in":3600}"#)
                .on_post(TOKEN_PATH, 200, r#"{"access_token":"second","expires_in":3600}"#),
        );
        let provider = provider(&transport);

        assert_eq!(provider.get_token().await.expect("token"), "first");
        provider.invalidate().await;
        assert_eq!(provider.get_token().await.expect("token"), "second");
    }

    #[tokio::test]
    async fn rejected_exchange_is_an_auth_failure() {
        let transport = Arc::new(ScriptedTransport::new().on_post(
            TOKEN_PATH,
            401,
            r#"{"error":"invalid_client","error_description":"bad secret"}"#,
        ));
        let provider = provider(&transport);

        let error = provider.get_token().await.expect_err("rejected exchange");
        assert!(matches!(error, GraphError::Auth { ref reason } if reason.contains("HTTP 401")));
    }

    #[tokio::test]
    async fn missing_token_field_is_an_auth_failure() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on_post(TOKEN_PATH, 200, r#"{"expires_in":3600}"#)
                .on_post(TOKEN_PATH, 200, "<html>maintenance</html>")
                .on_post(TOKEN_PATH, 200, r#"{"access_token":"tok"}"#),
        );
        let provider = provider(&transport);

        for _ in 0..3 {
            let error = provider.get_token().await.expect_err("malformed response");
            assert!(matches!(error, GraphError::Auth { .. }), "unexpected error: {error}");
        }
    }

    #[tokio::test]
    async fn lifetime_inside_margin_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new().on_post(TOKEN_PATH, 200, r#"{"access_token":"short","expires_in":45}"#));
        let provider = provider(&transport);

        assert!(matches!(provider.get_token().await, Err(GraphError::Auth { .. })));
    }

    #[test]
    fn freshness_honors_margin() {
        let now = Instant::now();
        let credential = Credential {
            access_token: "t".into(),
            expires_at: now + Duration::from_secs(90),
        };
        assert!(credential.is_fresh(Duration::from_secs(60), now));
        assert!(!credential.is_fresh(Duration::from_secs(90), now));
        assert!(!credential.is_fresh(Duration::from_secs(60), now + Duration::from_secs(31)));
    }
}
