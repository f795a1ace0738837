//! Configuration validation rules.
//!
//! This module provides validation logic for `MigrateConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::MigrateConfig;
use thiserror::Error;

const MAX_PAGE_SIZE: usize = 100_000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl MigrateConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `page_size` is 0 or exceeds 100000
    /// - `db_file_name` is empty, or names a path instead of a file
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid { field: "page_size".into(), reason: "must be greater than 0".into() });
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                field: "page_size".into(),
                reason: format!("must not exceed {MAX_PAGE_SIZE}"),
            });
        }

        if self.db_file_name.is_empty() {
            return Err(ConfigError::Invalid { field: "db_file_name".into(), reason: "must not be empty".into() });
        }
        if self.db_file_name.contains(['/', '\\']) || self.db_file_name == "." || self.db_file_name == ".." {
            return Err(ConfigError::Invalid {
                field: "db_file_name".into(),
                reason: "must be a bare file name".into(),
            });
        }

        Ok(())
    }

    /// Settings that are valid but weaken the run; the caller logs these once
    /// logging is set up.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if !self.check_key_count {
            warnings.push("check_key_count is disabled; keys present only in the destination will not be detected");
        }
        warnings
    }
}
