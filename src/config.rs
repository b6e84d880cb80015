//! Store configuration
//!
//! Layered with the `config` crate, later sources overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. an optional file (TOML, YAML or JSON by extension)
//! 3. `PAGESTORE__*` environment variables, e.g. `PAGESTORE__MAX_BATCH_SIZE=10`

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::operations::pages::DEFAULT_LIST_LIMIT;
use crate::storage::memory::DEFAULT_PAGE_SIZE;
use crate::storage::{DEFAULT_MAX_BATCH_SIZE, PATH_INDEX};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "PAGESTORE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub table_name: String,
    /// Requests per batch write call, at most [`DEFAULT_MAX_BATCH_SIZE`].
    pub max_batch_size: usize,
    pub default_list_limit: usize,
    /// Items returned per query page by the engine.
    pub query_page_size: usize,
    pub path_index: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "pages".to_string(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            default_list_limit: DEFAULT_LIST_LIMIT,
            query_page_size: DEFAULT_PAGE_SIZE,
            path_index: PATH_INDEX.to_string(),
        }
    }
}

impl StoreConfig {
    /// Loads defaults, then `file` if it exists, then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("table_name", defaults.table_name)
            .and_then(|b| b.set_default("max_batch_size", defaults.max_batch_size as i64))
            .and_then(|b| b.set_default("default_list_limit", defaults.default_list_limit as i64))
            .and_then(|b| b.set_default("query_page_size", defaults.query_page_size as i64))
            .and_then(|b| b.set_default("path_index", defaults.path_index))
            .map_err(|e| Error::Config(e.to_string()))?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(false));
        }

        let config: StoreConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(Error::Config("table_name cannot be empty".to_string()));
        }
        if !(1..=DEFAULT_MAX_BATCH_SIZE).contains(&self.max_batch_size) {
            return Err(Error::Config(format!(
                "max_batch_size must be between 1 and {}, got {}",
                DEFAULT_MAX_BATCH_SIZE, self.max_batch_size
            )));
        }
        if self.default_list_limit == 0 {
            return Err(Error::Config("default_list_limit must be positive".to_string()));
        }
        if self.query_page_size == 0 {
            return Err(Error::Config("query_page_size must be positive".to_string()));
        }
        if self.path_index.is_empty() {
            return Err(Error::Config("path_index cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_batch_size, 25);
        assert_eq!(config.default_list_limit, 50);
        assert_eq!(config.path_index, "GSI1");
    }

    #[test]
    fn test_validation() {
        let config = StoreConfig {
            max_batch_size: 26,
            ..StoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = StoreConfig {
            default_list_limit: 0,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("pagestore-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "table_name = \"cms\"\nmax_batch_size = 10\n").unwrap();

        let config = StoreConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.table_name, "cms");
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.query_page_size, 100);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("pagestore-missing-config.toml");
        let config = StoreConfig::load(Some(&path)).unwrap();
        assert_eq!(config.table_name, StoreConfig::default().table_name);
    }
}
