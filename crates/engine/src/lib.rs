//! Migration engine for cache-migrate.
//!
//! This crate provides:
//! - The migration driver that copies every entry into a fresh store
//! - An independent verification pass over both stores
//! - Summary reporting and the run-level error taxonomy
//!
//! Processing is strictly sequential and stops at the first fault.

pub mod driver;
pub mod error;
pub mod observer;
pub mod report;
pub mod run;
pub mod verify;

pub use driver::{Fault, FaultStage, MigrationResult, Migrator};
pub use error::RunError;
pub use observer::{MigrationObserver, Stage, TracingObserver};
pub use report::{Summary, Verdict};
pub use run::{RunOptions, RunReport, migrate_and_verify, run_cycle, run_verify_only};
pub use verify::{EntryField, KeyCountCheck, Mismatch, VerificationResult, Verifier};
