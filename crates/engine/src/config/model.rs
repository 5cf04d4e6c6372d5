//! Data models for the intake configuration file.

use std::fmt;
use std::time::Duration;

use intake_api::{ClientCredentials, DEFAULT_AUTHORITY_URL, DEFAULT_GRAPH_BASE_URL, DEFAULT_SCOPE, GraphError, GraphSettings};
use intake_types::ResourceKey;
use intake_types::columns::default_expected_columns;
use intake_util::{FieldNameMap, InterpolationError, SchemaNormalizer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 15 * 60;
pub const DEFAULT_TOKEN_SAFETY_MARGIN_SECONDS: u64 = 60;

/// Root of `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntakeConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

/// Tenant identity and endpoints of the remote list service.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphConfig {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    /// Supports `${env:NAME}` and `${secret:NAME}`.
    #[serde(default)]
    pub client_secret: String,
    pub authority_url: Option<String>,
    pub base_url: Option<String>,
    pub scope: Option<String>,
    pub token_safety_margin_seconds: Option<u64>,
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("authority_url", &self.authority_url)
            .field("base_url", &self.base_url)
            .field("scope", &self.scope)
            .field("token_safety_margin_seconds", &self.token_safety_margin_seconds)
            .finish()
    }
}

/// Location of the survey list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default)]
    pub hostname: String,
    /// Server-relative site path, e.g. `/sites/Intake`.
    #[serde(default)]
    pub site_path: String,
    /// Display name of the list.
    #[serde(default)]
    pub list_name: String,
    /// When present, fetched records keep only these fields.
    pub projected_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

/// Field-name decoding entries and the columns every row must carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchemaConfig {
    /// Encoded identifier to canonical name; merged over the built-in map.
    #[serde(default)]
    pub field_names: FieldNameMap,
    pub expected_columns: Option<Vec<String>>,
}

impl IntakeConfig {
    pub fn graph_settings(&self) -> GraphSettings {
        let graph = &self.graph;
        GraphSettings {
            base_url: graph.base_url.clone().unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string()),
            authority_url: graph
                .authority_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHORITY_URL.to_string()),
            scope: graph.scope.clone().unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            token_safety_margin: Duration::from_secs(
                graph
                    .token_safety_margin_seconds
                    .unwrap_or(DEFAULT_TOKEN_SAFETY_MARGIN_SECONDS),
            ),
            ..GraphSettings::default()
        }
    }

    pub fn credentials(&self) -> Result<ClientCredentials, GraphError> {
        ClientCredentials::new(
            self.graph.tenant_id.clone(),
            self.graph.client_id.clone(),
            self.graph.client_secret.clone(),
        )
    }

    pub fn resource_key(&self) -> ResourceKey {
        let source = &self.source;
        let key = ResourceKey::new(source.hostname.trim(), source.site_path.trim(), source.list_name.clone());
        match &source.projected_fields {
            Some(fields) => key.with_projection(fields.iter().map(String::as_str)),
            None => key,
        }
    }

    /// Built-in field names extended with the configured ones.
    pub fn normalizer(&self) -> SchemaNormalizer {
        let mut field_names = FieldNameMap::builtin();
        field_names.extend(self.schema.field_names.clone());
        let expected = self
            .schema
            .expected_columns
            .clone()
            .unwrap_or_else(default_expected_columns);
        SchemaNormalizer::new(field_names, expected)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Interpolation error in {field}: {source}")]
    Interpolation {
        field: &'static str,
        #[source]
        source: InterpolationError,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] crate::config::ValidationError),
}
