//! Command-line arguments.

use std::path::PathBuf;

use cachemig_core::{LogFormat, MigrateConfig};
use clap::{Parser, Subcommand, ValueEnum};

/// cache-migrate - copy a cache store into a fresh one and prove the copy is lossless
#[derive(Parser, Debug)]
#[command(name = "cache-migrate")]
#[command(version, about = "Migrate a cache store and verify the copy entry by entry")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file (overrides CACHE_MIGRATE_CONFIG_FILE)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Keys fetched per enumeration page
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    /// Skip comparing total entry counts after verification
    #[arg(long, global = true)]
    pub no_key_count_check: bool,

    /// Database file name inside each store directory
    #[arg(long, global = true)]
    pub db_file_name: Option<String>,

    /// Log line format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Write the run summary as JSON to this file
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate every entry from SOURCE into a new store at DESTINATION, then verify
    Migrate {
        /// Directory holding the existing cache store
        source: PathBuf,

        /// Directory for the new cache store (created; must not hold entries)
        destination: PathBuf,
    },

    /// Verify an already migrated DESTINATION against SOURCE
    Verify {
        /// Directory holding the original cache store
        source: PathBuf,

        /// Directory holding the migrated cache store
        destination: PathBuf,
    },
}

/// CLI-friendly log format enum
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Apply flags on top of the loaded configuration; flags win.
    pub fn apply_overrides(&self, config: &mut MigrateConfig) {
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if self.no_key_count_check {
            config.check_key_count = false;
        }
        if let Some(name) = &self.db_file_name {
            config.db_file_name = name.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format.into();
        }
    }
}
