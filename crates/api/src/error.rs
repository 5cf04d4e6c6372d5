use std::fmt;

use thiserror::Error;

/// Kind of remote resource that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Site,
    List,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Site => f.write_str("site"),
            ResourceKind::List => f.write_str("list"),
        }
    }
}

/// Failures surfaced by the remote API client.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The credential exchange was rejected or returned a malformed body.
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    /// A site or list could not be resolved. `available` lists the names the
    /// service did expose, for diagnosing configuration mismatches.
    #[error("{kind} '{requested}' not found; available: [{}]", .available.join(", "))]
    ResourceNotFound {
        kind: ResourceKind,
        requested: String,
        available: Vec<String>,
    },

    /// An HTTP call failed, timed out or returned a non-success status.
    #[error("request to {url} failed{}: {message}", .status.map(|code| format!(" with HTTP {code}")).unwrap_or_default())]
    Transport { url: String, status: Option<u16>, message: String },

    /// Client construction was given unusable settings.
    #[error("invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl GraphError {
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth { reason: reason.into() }
    }

    pub fn transport(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// HTTP status carried by a transport failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_enumerates_available_names() {
        let error = GraphError::ResourceNotFound {
            kind: ResourceKind::List,
            requested: "Missing List".into(),
            available: vec!["Survey 2024".into(), "Other".into()],
        };
        assert_eq!(error.to_string(), "list 'Missing List' not found; available: [Survey 2024, Other]");
    }

    #[test]
    fn transport_message_includes_status_when_known() {
        let with_status = GraphError::transport("https://graph.test/v1.0/sites", Some(503), "unavailable");
        assert_eq!(with_status.to_string(), "request to https://graph.test/v1.0/sites failed with HTTP 503: unavailable");
        assert_eq!(with_status.status(), Some(503));

        let without = GraphError::transport("https://graph.test/v1.0/sites", None, "timed out");
        assert_eq!(without.to_string(), "request to https://graph.test/v1.0/sites failed: timed out");
    }
}
