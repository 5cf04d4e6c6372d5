//! Redaction of credentials that may leak into log lines or error messages.
//!
//! Token endpoint and directory responses are echoed into diagnostics when a
//! call fails; anything that looks like a bearer token, client secret or
//! access token is replaced before the text leaves the process.

use once_cell::sync::Lazy;
use regex::Regex;

const REPLACEMENT: &str = "[REDACTED]";

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(build_redact_patterns);

fn build_redact_patterns() -> Vec<Regex> {
    [
        r"(?i)(authorization:\s*)([^\r\n]+)",
        r"(?i)(\bBearer\s+)([A-Za-z0-9\-._~+/]+=*)",
        r#"(?i)("(?:access_token|refresh_token|id_token|client_secret)"\s*:\s*")([^"]*)"#,
        r"(?i)(\b(?:access_token|refresh_token|client_secret)=)([^&\s]+)",
        r"(?i)(\b[A-Z0-9_]*(?:SECRET|TOKEN|PASSWORD)=)([^\s]+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
}

/// Redacts values that look like secrets in a string.
///
/// ```rust
/// use intake_util::redact_sensitive;
///
/// let redacted = redact_sensitive(r#"{"access_token":"eyJ0eXAi","expires_in":3599}"#);
/// assert_eq!(redacted, r#"{"access_token":"[REDACTED]","expires_in":3599}"#);
///
/// assert_eq!(redact_sensitive("Authorization: Bearer abc.def"), "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}{REPLACEMENT}")
            })
            .into_owned();
    }
    redacted
}

/// Redacts and shortens response text for inclusion in diagnostics.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let redacted = redact_sensitive(text.trim());
    if redacted.chars().count() <= max_chars {
        return redacted;
    }

    // Reserve space for the trailing ellipsis.
    let target_len = max_chars.saturating_sub(3);
    let truncated: String = redacted.chars().take(target_len).collect();
    format!("{}...", truncated.trim_end())
}
