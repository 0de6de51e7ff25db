//! Rankkeeper Configuration System
//!
//! TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub ranking: RankingConfig,
    pub well_known: WellKnownConfig,

    /// Optional seed document applied at startup
    pub seed_file: Option<String>,
}

/// Role store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub sqlite_url: String,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sqlite_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

/// Rank interpolation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Distance stepped away from a reference weight when there is no neighbour
    pub weight_step: f64,
    /// Attempts for an interpolating insert that loses a weight race
    pub max_insert_attempts: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weight_step: 100.0,
            max_insert_attempts: 3,
        }
    }
}

/// Names behind the convenience predicates (`moderator?`, `sysadmin?`, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WellKnownConfig {
    pub default_category: String,
    pub moderator: String,
    pub editor: String,
    pub sysadmin: String,
}

impl Default for WellKnownConfig {
    fn default() -> Self {
        Self {
            default_category: "harami".to_string(),
            moderator: "moderator".to_string(),
            editor: "editor".to_string(),
            sysadmin: "sysadmin".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ranking.weight_step.is_finite() || self.ranking.weight_step <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "ranking.weight_step must be a positive number, got {}",
                self.ranking.weight_step
            )));
        }
        if self.ranking.max_insert_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "ranking.max_insert_attempts must be at least 1".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.sqlite_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.sqlite_url is required for the sqlite backend".to_string(),
            ));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "store.max_connections must be at least 1".to_string(),
            ));
        }
        let names = [
            ("well_known.default_category", &self.well_known.default_category),
            ("well_known.moderator", &self.well_known.moderator),
            ("well_known.editor", &self.well_known.editor),
            ("well_known.sysadmin", &self.well_known.sysadmin),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Rankkeeper Configuration
# Environment variables (RANKKEEPER_*) override these settings

# seed_file = "./seed.toml"

[store]
backend = "memory"  # memory, sqlite
sqlite_url = "sqlite::memory:"
max_connections = 1

[ranking]
weight_step = 100.0
max_insert_attempts = 3

[well_known]
default_category = "harami"
moderator = "moderator"
editor = "editor"
sysadmin = "sysadmin"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.ranking.weight_step, 100.0);
        assert_eq!(config.well_known.sysadmin, "sysadmin");
    }

    #[test]
    fn test_example_toml_parses() {
        let config = AppConfig::from_toml_str(&AppConfig::example_toml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.ranking.max_insert_attempts, 3);
        assert_eq!(config.well_known.default_category, "harami");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [store]
            backend = "sqlite"
            sqlite_url = "sqlite://roles.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.sqlite_url, "sqlite://roles.db");
        assert_eq!(config.ranking.weight_step, 100.0);
    }

    #[test]
    fn test_validation_rejects_bad_ranking() {
        let mut config = AppConfig::default();
        config.ranking.weight_step = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = AppConfig::default();
        config.ranking.max_insert_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.well_known.editor = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_is_a_parse_error() {
        let result = AppConfig::from_toml_str("[store]\nbackend = \"mongo\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
