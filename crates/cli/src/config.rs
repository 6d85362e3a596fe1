//! Configuration management for the CLI

use fleet_lib::config::{DEFAULT_CONCURRENCY, DEFAULT_TOP_N};
use fleet_lib::{ConfigurationError, Credentials, Environment, EnvironmentCatalog, FleetConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Prefix for environment variable overrides, e.g. `FLEET__CONCURRENCY=8`
const ENV_PREFIX: &str = "FLEET";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigurationError),
}

/// Settings file contents, overlaid with `FLEET__*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct FleetSettings {
    /// Clusters collected at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Size of the top pod rankings
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Give up on unfinished clusters after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    #[serde(default)]
    pub environments: Vec<Environment>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl FleetSettings {
    /// Load settings from `path`, or from the default location if it exists
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default) = default_config_path() {
                    builder = builder.add_source(config::File::from(default).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Validated catalog of every configured environment
    pub fn catalog(&self) -> Result<EnvironmentCatalog, ConfigurationError> {
        EnvironmentCatalog::new(self.environments.clone())
    }

    /// Run tunables from the settings file
    pub fn fleet_config(&self) -> FleetConfig {
        FleetConfig {
            concurrency: self.concurrency,
            top_n: self.top_n,
            deadline: self.deadline_secs.map(Duration::from_secs),
            suffix_view: None,
        }
    }
}

/// Get the default settings file path
pub fn default_config_path() -> Option<PathBuf> {
    let home = dirs_next::home_dir()?;
    Some(home.join(".config").join("fleet").join("fleet.toml"))
}

/// Resolve an environment's credentials from the process environment
pub fn resolve_credentials(environment: &Environment) -> Credentials {
    resolve_credentials_with(environment, |key| std::env::var(key).ok())
}

/// Resolve `<REF>_AWS_*` variables through `lookup`
pub fn resolve_credentials_with<F>(environment: &Environment, lookup: F) -> Credentials
where
    F: Fn(&str) -> Option<String>,
{
    let reference = environment.credentials_ref().to_uppercase();
    let var = |name: &str| {
        lookup(&format!("{}_{}", reference, name)).filter(|value| !value.is_empty())
    };

    Credentials {
        access_key_id: var("AWS_ACCESS_KEY_ID"),
        secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
        session_token: var("AWS_SESSION_TOKEN"),
        reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const SETTINGS: &str = r#"
concurrency = 2
deadline_secs = 90

[[environments]]
name = "dev"
region = "us-east-1"
suffixes = ["dev", "devb", "devc"]

[[environments]]
name = "idev"
region = "us-east-1"
credentials_ref = "integration"
"#;

    #[test]
    fn test_load_settings_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fleet.toml");
        std::fs::write(&path, SETTINGS).unwrap();

        let settings = FleetSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.top_n, DEFAULT_TOP_N);
        assert_eq!(settings.environments.len(), 2);
        assert!(settings.environments[1].suffixes.is_empty());

        let config = settings.fleet_config();
        assert_eq!(config.deadline, Some(Duration::from_secs(90)));

        let catalog = settings.catalog().unwrap();
        assert_eq!(catalog.get("dev").unwrap().suffixes.len(), 3);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = FleetSettings::load(Some(&temp_dir.path().join("absent.toml")));
        assert!(matches!(result, Err(SettingsError::Load(_))));
    }

    #[test]
    fn test_invalid_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fleet.toml");
        std::fs::write(
            &path,
            r#"
[[environments]]
name = "dev"
region = "us-east-1"
suffixes = ["dev", "dev"]
"#,
        )
        .unwrap();

        let settings = FleetSettings::load(Some(&path)).unwrap();
        assert!(matches!(
            settings.catalog(),
            Err(ConfigurationError::DuplicateSuffix { .. })
        ));
    }

    #[test]
    fn test_resolve_credentials() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DEV_AWS_ACCESS_KEY_ID", "AKIADEV"),
            ("DEV_AWS_SECRET_ACCESS_KEY", "secret"),
            ("DEV_AWS_SESSION_TOKEN", ""),
            ("INTEGRATION_AWS_ACCESS_KEY_ID", "AKIAINT"),
        ]);
        let lookup = |key: &str| vars.get(key).map(|v| v.to_string());

        let dev = Environment::new("dev", "us-east-1", &["dev"]);
        let creds = resolve_credentials_with(&dev, lookup);
        assert_eq!(creds.reference, "DEV");
        assert_eq!(creds.access_key_id.as_deref(), Some("AKIADEV"));
        assert!(creds.session_token.is_none());
        assert!(creds.is_complete());

        let mut idev = Environment::new("idev", "us-east-1", &[]);
        idev.credentials_ref = Some("integration".to_string());
        let creds = resolve_credentials_with(&idev, lookup);
        assert_eq!(creds.reference, "INTEGRATION");
        assert!(!creds.is_complete());
    }
}
