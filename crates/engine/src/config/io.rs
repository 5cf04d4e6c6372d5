//! Configuration IO helpers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::config_dir;
use intake_util::expand_tilde;
use tracing::{debug, info};

use crate::config::{ConfigError, IntakeConfig, apply_env_overrides, interpolate_config, validate_config};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV_VAR: &str = "INTAKE_CONFIG_PATH";

/// Returns the default path for the intake configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV_VAR)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("intake")
        .join("config.json")
}

/// Loads configuration from the default path.
pub fn load_config() -> Result<IntakeConfig, ConfigError> {
    load_config_from_path(&default_config_path())
}

/// Loads configuration from `path`.
///
/// A missing file is not an error: the environment overrides alone may
/// supply a complete configuration. The result is interpolated, overridden
/// from the environment and validated, in that order.
pub fn load_config_from_path(path: &Path) -> Result<IntakeConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)?;
        info!(path = %path.display(), "configuration file loaded");
        serde_json::from_str::<IntakeConfig>(&content)?
    } else {
        debug!(path = %path.display(), "configuration file not found; using defaults");
        IntakeConfig::default()
    };

    interpolate_config(&mut config)?;
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use crate::config::ENV_OVERRIDES;

    use super::*;

    const CONFIG: &str = r#"{
      "graph": { "tenantId": "tenant-1", "clientId": "client-1", "clientSecret": "${env:INTAKE_IO_TEST_SECRET}" },
      "source": { "hostname": "contoso.sharepoint.com", "sitePath": "/sites/Intake", "listName": "Survey 2024" }
    }"#;

    fn without_overrides<R>(extra: Vec<(&'static str, Option<&'static str>)>, body: impl FnOnce() -> R) -> R {
        let mut vars: Vec<(&str, Option<&str>)> = ENV_OVERRIDES.iter().map(|name| (*name, None)).collect();
        vars.extend(extra);
        temp_env::with_vars(vars, body)
    }

    #[test]
    fn default_path_honors_environment_override() {
        let override_path = "~/custom/intake/config.json";
        temp_env::with_var(CONFIG_PATH_ENV_VAR, Some(override_path), || {
            assert_eq!(default_config_path(), expand_tilde(override_path));
        });
    }

    #[test]
    fn default_path_falls_back_to_config_dir() {
        temp_env::with_var_unset(CONFIG_PATH_ENV_VAR, || {
            assert!(default_config_path().ends_with("intake/config.json"));
        });
    }

    #[test]
    fn loads_interpolates_and_validates_file() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("config.json");
        write(&path, CONFIG).expect("write config");

        let config = without_overrides(vec![("INTAKE_IO_TEST_SECRET", Some("from-env"))], || {
            load_config_from_path(&path).expect("config loads")
        });
        assert_eq!(config.graph.client_secret, "from-env");
        assert_eq!(config.source.list_name, "Survey 2024");
    }

    #[test]
    fn missing_file_can_be_completed_by_environment() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("absent.json");

        let config = without_overrides(
            vec![
                ("GRAPH_TENANT_ID", Some("tenant-env")),
                ("GRAPH_CLIENT_ID", Some("client-env")),
                ("GRAPH_CLIENT_SECRET", Some("secret-env")),
                ("SHAREPOINT_HOSTNAME", Some("contoso.sharepoint.com")),
                ("SHAREPOINT_SITE_PATH", Some("/sites/Intake")),
                ("SHAREPOINT_LIST_NAME", Some("Survey 2024")),
            ],
            || load_config_from_path(&path).expect("environment completes config"),
        );
        assert_eq!(config.graph.tenant_id, "tenant-env");
        assert_eq!(config.source.site_path, "/sites/Intake");
    }

    #[test]
    fn incomplete_config_fails_validation() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("absent.json");

        let error = without_overrides(Vec::new(), || load_config_from_path(&path).expect_err("incomplete"));
        assert!(matches!(error, ConfigError::Validation(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("config.json");
        write(&path, "{ not json").expect("write config");

        let error = without_overrides(Vec::new(), || load_config_from_path(&path).expect_err("malformed"));
        assert!(matches!(error, ConfigError::Json(_)));
    }
}
