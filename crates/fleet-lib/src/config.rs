//! Validated run configuration
//!
//! Loading is left to the caller (the CLI layers a file and environment
//! variables with the `config` crate). This module only decides whether a
//! set of environment definitions is usable, and fails fast when it is not.

use crate::classifier::OTHERS_GROUP;
use crate::error::ConfigurationError;
use crate::models::Environment;
use std::collections::HashSet;
use std::time::Duration;

/// Default number of clusters collected concurrently
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default size of the top CPU / memory pod rankings
pub const DEFAULT_TOP_N: usize = 5;

/// Environment definitions that passed validation, in configured order
#[derive(Debug, Clone)]
pub struct EnvironmentCatalog {
    environments: Vec<Environment>,
}

impl EnvironmentCatalog {
    pub fn new(environments: Vec<Environment>) -> Result<Self, ConfigurationError> {
        if environments.is_empty() {
            return Err(ConfigurationError::NoEnvironments);
        }

        let mut names = HashSet::new();
        for env in &environments {
            validate_environment(env)?;
            if !names.insert(env.name.as_str()) {
                return Err(ConfigurationError::DuplicateEnvironment(env.name.clone()));
            }
        }

        Ok(Self { environments })
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// Resolve a selection of environment names, keeping catalog order
    ///
    /// An empty selection means every environment.
    pub fn select(&self, names: &[String]) -> Result<Vec<Environment>, ConfigurationError> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(ConfigurationError::UnknownEnvironment(unknown.clone()));
        }

        Ok(self
            .environments
            .iter()
            .filter(|e| names.is_empty() || names.contains(&e.name))
            .cloned()
            .collect())
    }
}

fn validate_environment(env: &Environment) -> Result<(), ConfigurationError> {
    if env.name.trim().is_empty() {
        return Err(ConfigurationError::EmptyEnvironmentName);
    }
    if env.region.trim().is_empty() {
        return Err(ConfigurationError::MissingRegion(env.name.clone()));
    }

    let mut seen = HashSet::new();
    for suffix in &env.suffixes {
        if suffix.is_empty() {
            return Err(ConfigurationError::EmptySuffix(env.name.clone()));
        }
        if suffix == OTHERS_GROUP {
            return Err(ConfigurationError::ReservedSuffix {
                environment: env.name.clone(),
                suffix: suffix.clone(),
            });
        }
        if !seen.insert(suffix.as_str()) {
            return Err(ConfigurationError::DuplicateSuffix {
                environment: env.name.clone(),
                suffix: suffix.clone(),
            });
        }
    }

    Ok(())
}

/// Tunables for one collection run
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Maximum clusters collected at the same time
    pub concurrency: usize,
    /// Size of the top CPU / memory pod rankings
    pub top_n: usize,
    /// Stop collecting and report what finished after this long
    pub deadline: Option<Duration>,
    /// Environment whose suffix totals are summarized across clusters
    pub suffix_view: Option<String>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            top_n: DEFAULT_TOP_N,
            deadline: None,
            suffix_view: None,
        }
    }
}

impl FleetConfig {
    /// Check the tunables against the environments selected for the run
    pub fn validate(&self, environments: &[Environment]) -> Result<(), ConfigurationError> {
        if self.concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency);
        }
        if let Some(view) = &self.suffix_view {
            if !environments.iter().any(|e| &e.name == view) {
                return Err(ConfigurationError::UnknownEnvironment(view.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> EnvironmentCatalog {
        EnvironmentCatalog::new(vec![
            Environment::new("dev", "us-east-1", &["dev", "devb", "devc"]),
            Environment::new("idev", "us-east-1", &[]),
            Environment::new("prod", "us-west-2", &["proda", "prodb"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_catalog_accepts_valid_environments() {
        let catalog = catalog();
        assert_eq!(catalog.environments().len(), 3);
        assert_eq!(catalog.get("prod").unwrap().region, "us-west-2");
        assert!(catalog.get("accp").is_none());
    }

    #[test]
    fn test_catalog_rejects_empty() {
        assert_eq!(
            EnvironmentCatalog::new(vec![]).unwrap_err(),
            ConfigurationError::NoEnvironments
        );
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let err = EnvironmentCatalog::new(vec![
            Environment::new("dev", "us-east-1", &[]),
            Environment::new("dev", "us-west-2", &[]),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateEnvironment("dev".to_string()));
    }

    #[test]
    fn test_catalog_rejects_bad_suffixes() {
        let err = EnvironmentCatalog::new(vec![Environment::new("dev", "us-east-1", &["dev", ""])])
            .unwrap_err();
        assert_eq!(err, ConfigurationError::EmptySuffix("dev".to_string()));

        let err =
            EnvironmentCatalog::new(vec![Environment::new("dev", "us-east-1", &["dev", "dev"])])
                .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateSuffix { .. }));

        let err =
            EnvironmentCatalog::new(vec![Environment::new("dev", "us-east-1", &["others"])])
                .unwrap_err();
        assert!(matches!(err, ConfigurationError::ReservedSuffix { .. }));
    }

    #[test]
    fn test_catalog_rejects_missing_region() {
        let err = EnvironmentCatalog::new(vec![Environment::new("dev", " ", &[])]).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingRegion("dev".to_string()));
    }

    #[test]
    fn test_select() {
        let catalog = catalog();
        let all = catalog.select(&[]).unwrap();
        assert_eq!(all.len(), 3);

        let some = catalog
            .select(&["prod".to_string(), "dev".to_string()])
            .unwrap();
        let names: Vec<_> = some.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dev", "prod"]);

        assert_eq!(
            catalog.select(&["qa".to_string()]).unwrap_err(),
            ConfigurationError::UnknownEnvironment("qa".to_string())
        );
    }

    #[test]
    fn test_fleet_config_validation() {
        let envs = catalog().select(&[]).unwrap();
        assert!(FleetConfig::default().validate(&envs).is_ok());

        let zero = FleetConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert_eq!(
            zero.validate(&envs).unwrap_err(),
            ConfigurationError::InvalidConcurrency
        );

        let bad_view = FleetConfig {
            suffix_view: Some("accp".to_string()),
            ..Default::default()
        };
        assert!(bad_view.validate(&envs).is_err());
    }
}
