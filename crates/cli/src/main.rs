//! cache-migrate entry point.
//!
//! Migrates a cache store into a fresh directory and verifies the copy.
//! Exit codes: 0 when the destination is a verified replica, 1 when the run
//! failed, 2 when arguments or configuration are unusable.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use cachemig_core::{MigrateConfig, SqliteStore, Store};
use cachemig_engine::{RunReport, TracingObserver, run_cycle, run_verify_only};
use chrono::Utc;
use clap::Parser;

mod args;
mod logging;

use args::{Cli, Command};

const EXIT_RUN_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    logging::init(config.log_format);
    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    match run(&cli, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_RUN_FAILED),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run failed");
            ExitCode::from(EXIT_RUN_FAILED)
        }
    }
}

fn load_config(cli: &Cli) -> Result<MigrateConfig> {
    let mut config = MigrateConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("validating command-line overrides")?;
    Ok(config)
}

/// Returns whether the run produced a verified replica.
async fn run(cli: &Cli, config: &MigrateConfig) -> Result<bool> {
    let report = match &cli.command {
        Command::Migrate { source, destination } => {
            tracing::info!(source = %source.display(), destination = %destination.display(), "starting migration");
            log_source_stats(source, config).await;
            run_cycle(source, destination, config, &TracingObserver).await?
        }
        Command::Verify { source, destination } => {
            tracing::info!(source = %source.display(), destination = %destination.display(), "starting verification");
            run_verify_only(source, destination, config, &TracingObserver).await?
        }
    };

    finish(cli, &report).await?;
    Ok(report.summary.is_success())
}

/// Pre-flight look at the source; failures here are left for the run to report.
async fn log_source_stats(source: &Path, config: &MigrateConfig) {
    let Ok(store) = SqliteStore::open_existing(source, &config.db_file_name).await else {
        return;
    };
    if let (Ok(total), Ok(expired)) = (store.count().await, store.count_expired(Utc::now()).await) {
        tracing::info!(total, expired, "source store opened; expired entries are copied verbatim");
    }
    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "failed to close source after pre-flight");
    }
}

async fn finish(cli: &Cli, report: &RunReport) -> Result<()> {
    report.summary.log();
    println!("{}", report.summary);

    if let Some(path) = &cli.report {
        let json = report.summary.to_json_pretty().context("serializing run report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing run report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "run report written");
    }

    if let Err(e) = report.outcome() {
        tracing::error!(error = %e, "destination is not a verified replica; discard it and re-run against a new directory");
    }
    Ok(())
}
