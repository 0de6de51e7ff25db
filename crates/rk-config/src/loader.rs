//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError, StoreBackend};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "rankkeeper.toml",
    "config.toml",
    "./config/rankkeeper.toml",
    "/etc/rankkeeper/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) but reads overrides through `lookup`.
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file(&lookup) {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, &lookup)?;
        config.validate()?;

        Ok(config)
    }

    fn find_config_file<F>(&self, lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Some(path) = lookup("RANKKEEPER_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvError(format!("{key} has an invalid value: {value}")))
}

fn apply_overrides<F>(config: &mut AppConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Store
    if let Some(val) = lookup("RANKKEEPER_STORE_BACKEND") {
        config.store.backend = StoreBackend::parse(&val).ok_or_else(|| {
            ConfigError::EnvError(format!("RANKKEEPER_STORE_BACKEND has an invalid value: {val}"))
        })?;
    }
    if let Some(val) = lookup("RANKKEEPER_SQLITE_URL") {
        config.store.sqlite_url = val;
    }
    if let Some(val) = lookup("RANKKEEPER_MAX_CONNECTIONS") {
        config.store.max_connections = parse_var("RANKKEEPER_MAX_CONNECTIONS", &val)?;
    }

    // Ranking
    if let Some(val) = lookup("RANKKEEPER_WEIGHT_STEP") {
        config.ranking.weight_step = parse_var("RANKKEEPER_WEIGHT_STEP", &val)?;
    }
    if let Some(val) = lookup("RANKKEEPER_MAX_INSERT_ATTEMPTS") {
        config.ranking.max_insert_attempts = parse_var("RANKKEEPER_MAX_INSERT_ATTEMPTS", &val)?;
    }

    // Well-known names
    if let Some(val) = lookup("RANKKEEPER_DEFAULT_CATEGORY") {
        config.well_known.default_category = val;
    }

    if let Some(val) = lookup("RANKKEEPER_SEED_FILE") {
        config.seed_file = Some(val).filter(|path| !path.trim().is_empty());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ranking]\nweight_step = 10.0\n").unwrap();

        let config = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[]))
            .unwrap();
        assert_eq!(config.ranking.weight_step, 10.0);
        assert_eq!(config.ranking.max_insert_attempts, 3);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nbackend = \"memory\"\n").unwrap();

        let config = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[
                ("RANKKEEPER_STORE_BACKEND", "sqlite"),
                ("RANKKEEPER_SQLITE_URL", "sqlite://override.db"),
                ("RANKKEEPER_WEIGHT_STEP", "50"),
                ("RANKKEEPER_DEFAULT_CATEGORY", "general_ja"),
            ]))
            .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.sqlite_url, "sqlite://override.db");
        assert_eq!(config.ranking.weight_step, 50.0);
        assert_eq!(config.well_known.default_category, "general_ja");
    }

    #[test]
    fn test_invalid_env_value_is_reported() {
        let result = ConfigLoader::with_path("/nonexistent/rankkeeper.toml")
            .load_with(lookup_from(&[("RANKKEEPER_MAX_INSERT_ATTEMPTS", "many")]));
        assert!(matches!(result, Err(ConfigError::EnvError(_))));

        let result = ConfigLoader::with_path("/nonexistent/rankkeeper.toml")
            .load_with(lookup_from(&[("RANKKEEPER_STORE_BACKEND", "mongo")]));
        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    }

    #[test]
    fn test_env_override_failing_validation() {
        let result = ConfigLoader::with_path("/nonexistent/rankkeeper.toml")
            .load_with(lookup_from(&[("RANKKEEPER_WEIGHT_STEP", "-5")]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
