//! Helpers shared by the intake pipeline crates.
//!
//! - [`schema`]: field-name decoding and completeness backfill for raw records
//! - [`date_handling`]: tolerant timestamp parsing and academic-term derivation
//! - [`secrets`]: `${env:NAME}` / `${secret:NAME}` interpolation for configuration values
//! - [`redact`]: scrubbing of credentials from log and error text

pub mod date_handling;
pub mod redact;
pub mod schema;
pub mod secrets;

use std::path::PathBuf;

use dirs_next::home_dir;

pub use date_handling::{AcademicTerm, TemporalEnricher, derive_term, parse_timestamp};
pub use redact::{redact_sensitive, truncate_for_log};
pub use schema::{FieldNameMap, SchemaNormalizer, normalize, normalize_column_name};
pub use secrets::{InterpolationError, SECRETS_BACKEND_ENV_VAR, SecretsBackend, interpolate_string, resolve_secret};

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    match trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        Some(rest) => home().join(rest),
        None => PathBuf::from(trimmed),
    }
}
