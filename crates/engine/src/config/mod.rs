//! Configuration management for the intake pipeline.
//! This module handles parsing, interpolation, environment overrides and
//! validation of the ~/.config/intake/config.json file.

mod interpolation;
mod io;
mod model;
mod validation;

pub use interpolation::{ENV_OVERRIDES, apply_env_overrides, interpolate_config};
pub use io::{CONFIG_PATH_ENV_VAR, default_config_path, load_config, load_config_from_path};
pub use model::{
    CacheConfig, ConfigError, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_TOKEN_SAFETY_MARGIN_SECONDS, GraphConfig, IntakeConfig, SchemaConfig,
    SourceConfig,
};
pub use validation::{ValidationError, validate_config, validate_site_path};
