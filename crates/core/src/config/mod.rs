//! Run configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CACHE_MIGRATE_*)
//! 2. TOML config file (explicit path, or CACHE_MIGRATE_CONFIG_FILE)
//! 3. Built-in defaults
//!
//! Command-line flags are applied on top by the binary.

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Log line encoding for the binary's subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Migration run configuration.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CACHE_MIGRATE_*)
/// 2. TOML config file
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// Keys fetched per enumeration page.
    ///
    /// Set via CACHE_MIGRATE_PAGE_SIZE environment variable.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Compare source and destination entry counts after verification, which
    /// catches keys present only in the destination.
    ///
    /// Set via CACHE_MIGRATE_CHECK_KEY_COUNT environment variable.
    #[serde(default = "default_true")]
    pub check_key_count: bool,

    /// Database file name inside each store directory.
    ///
    /// Set via CACHE_MIGRATE_DB_FILE_NAME environment variable.
    #[serde(default = "default_db_file_name")]
    pub db_file_name: String,

    /// Set via CACHE_MIGRATE_LOG_FORMAT environment variable (`text` or `json`).
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_page_size() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_db_file_name() -> String {
    "cache.db".into()
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            check_key_count: true,
            db_file_name: default_db_file_name(),
            log_format: LogFormat::Text,
        }
    }
}

impl MigrateConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// `config_file` wins over `CACHE_MIGRATE_CONFIG_FILE` when both are given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Ok(path) = std::env::var("CACHE_MIGRATE_CONFIG_FILE") {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment = figment.merge(
            Env::prefixed("CACHE_MIGRATE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into()),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
