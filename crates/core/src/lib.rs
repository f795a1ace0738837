//! Core types and storage for cache-migrate.
//!
//! This crate provides:
//! - The `Store` contract and the `Entry`/`Key` data model
//! - A SQLite-backed store adapter
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod store;

pub use config::{ConfigError, LogFormat, MigrateConfig};
pub use error::Error;
pub use store::{Entry, Key, KeyPage, KeyStream, ScanCursor, SqliteStore, Store};
