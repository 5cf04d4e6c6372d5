//! Placeholder interpolation and environment overrides for configuration.

use std::env;

use intake_util::interpolate_string;
use tracing::debug;

use crate::config::{ConfigError, IntakeConfig};

/// Environment variables that override individual configuration values.
pub const ENV_OVERRIDES: &[&str] = &[
    "GRAPH_TENANT_ID",
    "GRAPH_CLIENT_ID",
    "GRAPH_CLIENT_SECRET",
    "SHAREPOINT_HOSTNAME",
    "SHAREPOINT_SITE_PATH",
    "SHAREPOINT_LIST_NAME",
];

fn interpolate_field(field: &'static str, value: &mut String) -> Result<(), ConfigError> {
    *value = interpolate_string(value).map_err(|source| ConfigError::Interpolation { field, source })?;
    Ok(())
}

fn interpolate_optional(field: &'static str, value: &mut Option<String>) -> Result<(), ConfigError> {
    if let Some(value) = value {
        interpolate_field(field, value)?;
    }
    Ok(())
}

/// Resolves `${env:NAME}` and `${secret:NAME}` in every string value.
pub fn interpolate_config(config: &mut IntakeConfig) -> Result<(), ConfigError> {
    let graph = &mut config.graph;
    interpolate_field("graph.tenantId", &mut graph.tenant_id)?;
    interpolate_field("graph.clientId", &mut graph.client_id)?;
    interpolate_field("graph.clientSecret", &mut graph.client_secret)?;
    interpolate_optional("graph.authorityUrl", &mut graph.authority_url)?;
    interpolate_optional("graph.baseUrl", &mut graph.base_url)?;
    interpolate_optional("graph.scope", &mut graph.scope)?;

    let source = &mut config.source;
    interpolate_field("source.hostname", &mut source.hostname)?;
    interpolate_field("source.sitePath", &mut source.site_path)?;
    interpolate_field("source.listName", &mut source.list_name)?;
    debug!("configuration interpolated");
    Ok(())
}

fn override_from_env(name: &str, target: &mut String) {
    if let Ok(value) = env::var(name)
        && !value.trim().is_empty()
    {
        debug!(variable = name, "configuration value overridden from environment");
        *target = value;
    }
}

/// Applies the [`ENV_OVERRIDES`] variables that are set and non-empty.
pub fn apply_env_overrides(config: &mut IntakeConfig) {
    override_from_env("GRAPH_TENANT_ID", &mut config.graph.tenant_id);
    override_from_env("GRAPH_CLIENT_ID", &mut config.graph.client_id);
    override_from_env("GRAPH_CLIENT_SECRET", &mut config.graph.client_secret);
    override_from_env("SHAREPOINT_HOSTNAME", &mut config.source.hostname);
    override_from_env("SHAREPOINT_SITE_PATH", &mut config.source.site_path);
    override_from_env("SHAREPOINT_LIST_NAME", &mut config.source.list_name);
}
