//! Configuration validation, applied after interpolation and overrides.

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::IntakeConfig;

const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Validate the entire intake configuration.
pub fn validate_config(config: &IntakeConfig) -> Result<(), ValidationError> {
    require("graph.tenantId", &config.graph.tenant_id)?;
    require("graph.clientId", &config.graph.client_id)?;
    require("graph.clientSecret", &config.graph.client_secret)?;
    require("source.hostname", &config.source.hostname)?;
    require("source.listName", &config.source.list_name)?;
    validate_site_path(&config.source.site_path)?;

    if config.cache.ttl_seconds == 0 {
        return Err(ValidationError::InvalidTtl);
    }
    if let Some(base_url) = &config.graph.base_url {
        validate_url("graph.baseUrl", base_url)?;
    }
    if let Some(authority_url) = &config.graph.authority_url {
        validate_url("graph.authorityUrl", authority_url)?;
    }
    if let Some(fields) = &config.source.projected_fields
        && fields.iter().any(|field| field.trim().is_empty())
    {
        return Err(ValidationError::MissingField {
            field: "source.projectedFields[]",
        });
    }

    debug!("configuration validated");
    Ok(())
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}

/// A site path is server-relative: it starts with `/` and names a site.
pub fn validate_site_path(path: &str) -> Result<(), ValidationError> {
    let trimmed = path.trim();
    if !trimmed.starts_with('/') || trimmed.trim_matches('/').is_empty() {
        return Err(ValidationError::InvalidSitePath { path: path.to_string() });
    }
    Ok(())
}

/// Require https unless the host is local.
fn validate_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(value).map_err(|error| ValidationError::InvalidUrl {
        field,
        reason: error.to_string(),
    })?;
    let host = parsed.host_str().unwrap_or_default();
    if LOCALHOST_DOMAINS.iter().any(|local| host.eq_ignore_ascii_case(local)) {
        return Ok(());
    }
    if parsed.scheme() != "https" {
        return Err(ValidationError::InvalidUrl {
            field,
            reason: format!("must use https for non-localhost hosts; got '{}://'", parsed.scheme()),
        });
    }
    Ok(())
}

/// Errors that can occur during validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Invalid site path '{path}': expected a server-relative path such as /sites/Intake")]
    InvalidSitePath { path: String },

    #[error("Invalid cache TTL: ttlSeconds must be greater than zero")]
    InvalidTtl,

    #[error("Invalid URL in '{field}': {reason}")]
    InvalidUrl { field: &'static str, reason: String },
}
