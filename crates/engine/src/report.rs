//! Summary reporting.
//!
//! `Summary` is a pure function of the pass results. A run succeeds only when
//! migration finished without a fault, verification actually ran, and
//! verification found nothing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::driver::MigrationResult;
use crate::error::RunError;
use crate::verify::VerificationResult;

/// Overall pass/fail outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Success,
    Failure,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => f.write_str("SUCCESS"),
            Verdict::Failure => f.write_str("FAILURE"),
        }
    }
}

/// Terminal error for a set of pass results, if any.
///
/// `migration` is `None` for verify-only runs.
pub fn evaluate(migration: Option<&MigrationResult>, verification: Option<&VerificationResult>) -> Result<(), RunError> {
    if let Some(migration) = migration {
        if let Some(fault) = &migration.first_error {
            return Err(RunError::from(fault));
        }
    }

    let Some(verification) = verification else {
        return Err(RunError::VerificationSkipped);
    };
    if let Some(fault) = &verification.fault {
        return Err(RunError::from(fault));
    }
    if let Some(mismatch) = &verification.mismatch {
        return Err(RunError::from(mismatch));
    }
    if let Some(check) = verification.key_counts.filter(|check| !check.matches()) {
        return Err(RunError::from(check));
    }

    Ok(())
}

/// Final counts and verdict of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub keys_seen: u64,
    pub migrated: u64,
    pub vanished: u64,
    pub failed: u64,
    /// `None` when verification never ran.
    pub verified: Option<u64>,
    pub verdict: Verdict,
    /// Terminal error message for failed runs.
    pub failure: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(migration: Option<&MigrationResult>, verification: Option<&VerificationResult>) -> Self {
        let outcome = evaluate(migration, verification);
        let counts = migration.cloned().unwrap_or_default();

        Self {
            keys_seen: counts.keys_seen,
            migrated: counts.migrated,
            vanished: counts.vanished,
            failed: counts.failed,
            verified: verification.map(|v| v.verified),
            verdict: if outcome.is_ok() { Verdict::Success } else { Verdict::Failure },
            failure: outcome.err().map(|e| e.to_string()),
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }

    /// Emit the summary as structured log events.
    pub fn log(&self) {
        match &self.failure {
            None => tracing::info!(
                keys_seen = self.keys_seen,
                migrated = self.migrated,
                vanished = self.vanished,
                failed = self.failed,
                verified = ?self.verified,
                verdict = %self.verdict,
                "run finished"
            ),
            Some(failure) => tracing::error!(
                keys_seen = self.keys_seen,
                migrated = self.migrated,
                vanished = self.vanished,
                failed = self.failed,
                verified = ?self.verified,
                verdict = %self.verdict,
                failure = %failure,
                "run finished"
            ),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== cache-migrate summary ====")?;
        writeln!(f, "keys seen : {}", self.keys_seen)?;
        writeln!(f, "migrated  : {}", self.migrated)?;
        writeln!(f, "vanished  : {}", self.vanished)?;
        writeln!(f, "failed    : {}", self.failed)?;
        match self.verified {
            Some(verified) => writeln!(f, "verified  : {verified}")?,
            None => writeln!(f, "verified  : skipped")?,
        }
        if let Some(failure) = &self.failure {
            writeln!(f, "error     : {failure}")?;
        }
        write!(f, "verdict   : {}", self.verdict)
    }
}
