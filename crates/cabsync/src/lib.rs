//! Cabsync Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Reconciles active cabinet coordinates from an ArcGIS feature layer into the
//! matching Quickbase records.
//!
//! # Overview
//!
//! One run is a strict sequence of stages (see [`pipeline`]):
//!
//! - **Extract**: read every feature and keep those with a point and a cabinet key
//! - **Project**: convert points to WGS 84 through the geometry service
//! - **Index**: map cabinet keys to Quickbase record ids
//! - **Match**: build one update per matched key with a complete point
//! - **Write**: send updates in batches, continuing past rejected batches
//! - **Report**: print a `PAD_RESULT` line and a `PAD_SUMMARY=` JSON line
//!
//! The remote systems sit behind the traits in [`remote`], so every stage can
//! be exercised against in-memory implementations.

pub mod arcgis;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod index;
pub mod matcher;
pub mod pipeline;
pub mod projection;
pub mod quickbase;
pub mod remote;
pub mod report;
pub mod writer;

// Re-export commonly used types
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use pipeline::{RunOutcome, RunStage, SyncPipeline};

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info};

use crate::arcgis::ArcGisClient;
use crate::pipeline::{finish_run, PipelineOutput, StageFailure, SyncOptions};
use crate::quickbase::QuickbaseClient;
use crate::report::{RunMetrics, RunReporter};

/// Active cabinet coordinate sync
#[derive(Parser, Debug, Default)]
#[command(name = "cabsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Prepare updates without writing them to Quickbase
    #[arg(long, env = "CABSYNC_DRY_RUN")]
    pub dry_run: bool,

    /// Load environment variables from this file instead of `.env`
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

/// Load a dotenv file into the process environment.
///
/// An explicitly named file must exist; the default `.env` is optional.
/// Variables already set in the environment win.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map(|()| Some(path.to_path_buf()))
            .map_err(|e| SyncError::config(format!("Failed to load {}: {e}", path.display()))),
        None => Ok(dotenvy::dotenv().ok()),
    }
}

/// Run one sync and print its summary to `out`.
///
/// `env_loaded` is the result of [`load_env_file`], performed before logging
/// was set up; a failure there is reported as an `INIT` failure.
pub async fn execute<W: Write>(
    cli: &Cli,
    env_loaded: Result<Option<PathBuf>>,
    out: &mut W,
) -> RunOutcome {
    let mut reporter = RunReporter::start();
    let result = run_sync(cli, env_loaded, reporter.metrics_mut()).await;
    let (outcome, _summary) = finish_run(reporter, result, out);
    outcome
}

async fn run_sync(
    cli: &Cli,
    env_loaded: Result<Option<PathBuf>>,
    metrics: &mut RunMetrics,
) -> std::result::Result<PipelineOutput, StageFailure> {
    let init = |e: SyncError| StageFailure::new(RunStage::Init, e);

    if let Some(path) = env_loaded.map_err(init)? {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let config = SyncConfig::from_env().map_err(init)?;
    if cli.dry_run {
        info!("Dry run: updates will be prepared but not written");
    }

    let mut arcgis = ArcGisClient::new(config.arcgis.clone(), config.http_timeout).map_err(init)?;
    arcgis.authenticate().await.map_err(init)?;
    let quickbase =
        QuickbaseClient::new(config.quickbase.clone(), config.http_timeout).map_err(init)?;

    let options = SyncOptions::from_config(&config, cli.dry_run);
    SyncPipeline::new(&arcgis, &arcgis, &quickbase, options)
        .run(metrics)
        .await
}
