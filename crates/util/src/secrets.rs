//! Interpolation of environment variables and secrets in configuration values.
//!
//! Configuration strings may reference `${env:NAME}` (process environment) or
//! `${secret:NAME}` (OS keychain, or the environment when
//! `INTAKE_SECRETS_BACKEND=env`). Resolved values are never logged.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

static SERVICE: &str = "intake";
/// Environment variable used to select the secret resolution backend.
pub const SECRETS_BACKEND_ENV_VAR: &str = "INTAKE_SECRETS_BACKEND";

static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{env:([\w+-]*)}").expect("env placeholder pattern is valid"));
static SECRET_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{secret:([\w+-]*)}").expect("secret placeholder pattern is valid"));

/// Secret resolution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsBackend {
    /// Resolve `${secret:NAME}` values via OS keychain (`keyring-rs`).
    Keychain,
    /// Resolve `${secret:NAME}` values from process environment variable `NAME`.
    Environment,
}

impl SecretsBackend {
    fn from_env_var(raw: Option<String>) -> Self {
        match raw.unwrap_or_default().trim().to_ascii_lowercase().as_str() {
            "env" => Self::Environment,
            _ => Self::Keychain,
        }
    }
}

/// Determine the currently configured secrets backend.
pub fn secrets_backend() -> SecretsBackend {
    SecretsBackend::from_env_var(std::env::var(SECRETS_BACKEND_ENV_VAR).ok())
}

/// Interpolate a string value, replacing `${env:NAME}` and `${secret:NAME}` patterns.
pub fn interpolate_string(value: &str) -> Result<String, InterpolationError> {
    let mut replacements = Vec::new();

    for captures in ENV_PLACEHOLDER.captures_iter(value) {
        let name = captures[1].to_string();
        let resolved = std::env::var(&name).map_err(|_| InterpolationError::MissingEnvVar { name: name.clone() })?;
        debug!("Interpolated env var: {} -> [REDACTED]", name);
        replacements.push((captures[0].to_string(), resolved));
    }

    for captures in SECRET_PLACEHOLDER.captures_iter(value) {
        let name = captures[1].to_string();
        let resolved = resolve_secret(&name)?;
        debug!("Interpolated secret: {} -> [REDACTED]", name);
        replacements.push((captures[0].to_string(), resolved));
    }

    let mut result = value.to_string();
    for (placeholder, resolved) in replacements {
        result = result.replace(&placeholder, &resolved);
    }
    Ok(result)
}

/// Resolve a secret using the configured secrets backend.
pub fn resolve_secret(name: &str) -> Result<String, InterpolationError> {
    match secrets_backend() {
        SecretsBackend::Environment => std::env::var(name).map_err(|error| InterpolationError::MissingSecret {
            name: name.to_string(),
            error: error.to_string(),
        }),
        SecretsBackend::Keychain => {
            let entry = keyring::Entry::new(SERVICE, name).map_err(|error| InterpolationError::KeyringError {
                name: name.to_string(),
                error: error.to_string(),
            })?;

            entry.get_password().map_err(|error| InterpolationError::MissingSecret {
                name: name.to_string(),
                error: error.to_string(),
            })
        }
    }
}

/// Errors that can occur during interpolation.
#[derive(Debug, Error, Clone)]
pub enum InterpolationError {
    #[error("Missing environment variable: {name}")]
    MissingEnvVar { name: String },

    #[error("Missing secret: {name} - {error}")]
    MissingSecret { name: String, error: String },

    #[error("Keyring error for {name}: {error}")]
    KeyringError { name: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_backend_defaults_to_keychain_when_env_var_is_missing() {
        temp_env::with_var(SECRETS_BACKEND_ENV_VAR, None::<&str>, || {
            assert_eq!(secrets_backend(), SecretsBackend::Keychain);
        });
    }

    #[test]
    fn interpolates_env_and_secret_placeholders() {
        temp_env::with_vars(
            [
                (SECRETS_BACKEND_ENV_VAR, Some("env")),
                ("INTAKE_TEST_TENANT", Some("tenant-123")),
                ("INTAKE_TEST_SECRET", Some("s3cr3t")),
            ],
            || {
                let resolved =
                    interpolate_string("${env:INTAKE_TEST_TENANT}/${secret:INTAKE_TEST_SECRET}").expect("placeholders resolve");
                assert_eq!(resolved, "tenant-123/s3cr3t");
            },
        );
    }

    #[test]
    fn missing_env_var_is_reported_by_name() {
        temp_env::with_var("INTAKE_TEST_UNSET", None::<&str>, || {
            let error = interpolate_string("${env:INTAKE_TEST_UNSET}").expect_err("unset variable");
            assert!(matches!(error, InterpolationError::MissingEnvVar { ref name } if name == "INTAKE_TEST_UNSET"));
        });
    }

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(interpolate_string("contoso.sharepoint.com").expect("no placeholders"), "contoso.sharepoint.com");
    }
}
