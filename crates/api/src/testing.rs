//! Scripted in-memory transport for tests.
//!
//! Routes are consumed in registration order: each request takes the first
//! unconsumed route whose method matches and whose URL fragment occurs in the
//! request URL. A request with no matching route fails as a transport error.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{ClientCredentials, GraphClient, GraphError, GraphSettings, GraphTransport, HttpReply};

pub const TEST_BASE_URL: &str = "https://graph.test/v1.0";
pub const TEST_AUTHORITY_URL: &str = "https://login.test";
pub const TEST_SCOPE: &str = "https://graph.test/.default";
pub const TEST_TENANT_ID: &str = "tenant-1";
pub const TEST_TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

#[derive(Debug)]
enum Outcome {
    Reply(HttpReply),
    Fail(String),
}

#[derive(Debug)]
struct Route {
    method: &'static str,
    fragment: String,
    outcome: Outcome,
}

/// A request observed by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub bearer: Option<String>,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<VecDeque<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(self, method: &'static str, fragment: &str, outcome: Outcome) -> Self {
        self.routes
            .lock()
            .expect("routes lock")
            .push_back(Route {
                method,
                fragment: fragment.to_string(),
                outcome,
            });
        self
    }

    pub fn on_get(self, fragment: &str, status: u16, body: &str) -> Self {
        self.route("GET", fragment, Outcome::Reply(HttpReply::new(status, body)))
    }

    pub fn on_post(self, fragment: &str, status: u16, body: &str) -> Self {
        self.route("POST", fragment, Outcome::Reply(HttpReply::new(status, body)))
    }

    /// A GET that fails before any HTTP response, like a timeout.
    pub fn fail_get(self, fragment: &str, message: &str) -> Self {
        self.route("GET", fragment, Outcome::Fail(message.to_string()))
    }

    /// Queues one successful token exchange.
    pub fn with_token(self) -> Self {
        self.on_post(TEST_TOKEN_PATH, 200, r#"{"access_token":"test-token","expires_in":3600}"#)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Number of scripted routes not yet consumed.
    pub fn pending(&self) -> usize {
        self.routes.lock().expect("routes lock").len()
    }

    fn respond(&self, request: RecordedRequest) -> Result<HttpReply, GraphError> {
        let url = request.url.clone();
        let method = request.method;
        self.requests.lock().expect("requests lock").push(request);

        let mut routes = self.routes.lock().expect("routes lock");
        let position = routes
            .iter()
            .position(|route| route.method == method && url.contains(&route.fragment));
        match position.and_then(|index| routes.remove(index)) {
            Some(Route {
                outcome: Outcome::Reply(reply),
                ..
            }) => Ok(reply),
            Some(Route {
                outcome: Outcome::Fail(message),
                ..
            }) => Err(GraphError::transport(url, None, message)),
            None => Err(GraphError::transport(url, None, format!("no scripted route for {method}"))),
        }
    }
}

#[async_trait]
impl GraphTransport for ScriptedTransport {
    async fn get(&self, url: &str, bearer_token: &str) -> Result<HttpReply, GraphError> {
        self.respond(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            bearer: Some(bearer_token.to_string()),
            form: Vec::new(),
        })
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, GraphError> {
        self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            bearer: None,
            form: form
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        })
    }
}

pub fn test_settings() -> GraphSettings {
    GraphSettings {
        base_url: TEST_BASE_URL.to_string(),
        authority_url: TEST_AUTHORITY_URL.to_string(),
        scope: TEST_SCOPE.to_string(),
        ..GraphSettings::default()
    }
}

pub fn test_credentials() -> ClientCredentials {
    ClientCredentials::new(TEST_TENANT_ID, "client-1", "secret-1").expect("test credentials")
}

/// A [`GraphClient`] wired to `transport` with test endpoints.
pub fn test_client(transport: &Arc<ScriptedTransport>) -> GraphClient {
    let transport: Arc<dyn GraphTransport> = transport.clone();
    GraphClient::with_transport(test_settings(), test_credentials(), transport).expect("test client")
}
