//! The reconciliation run
//!
//! Stages execute strictly in sequence, each consuming the full output of the
//! previous one:
//!
//! ```text
//! INIT → EXTRACTING → PROJECTING → INDEXING → MATCHING → WRITING → REPORTING
//! ```
//!
//! Any stage may fail fatally; the error is tagged with the stage and carried
//! to [`finish_run`], which records it, emits the summary, and yields
//! [`RunOutcome::Fatal`]. Write batch rejections are not fatal.

use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use cabsync_common::types::{CabinetKey, Wkid};
use chrono::Local;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::export::export_unmatched;
use crate::extract::extract_usable;
use crate::index::build_remote_index;
use crate::matcher::build_updates;
use crate::projection::project_points;
use crate::remote::{FeatureSource, ProjectionService, RecordStore};
use crate::report::{RunMetrics, RunReporter, RunSummary};
use crate::writer::{write_in_batches, WriteReport};

/// Stages of a run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStage {
    Init,
    Extracting,
    Projecting,
    Indexing,
    Matching,
    Writing,
    Reporting,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Init => "INIT",
            RunStage::Extracting => "EXTRACTING",
            RunStage::Projecting => "PROJECTING",
            RunStage::Indexing => "INDEXING",
            RunStage::Matching => "MATCHING",
            RunStage::Writing => "WRITING",
            RunStage::Reporting => "REPORTING",
        };
        f.write_str(name)
    }
}

/// A fatal error and the stage it escaped from
#[derive(Debug)]
pub struct StageFailure {
    pub stage: RunStage,
    pub error: SyncError,
}

impl StageFailure {
    pub fn new(stage: RunStage, error: SyncError) -> Self {
        Self { stage, error }
    }
}

/// Tuning knobs for one run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub layer_item_id: String,
    pub cabinet_id_fields: Vec<String>,
    pub target_wkid: Wkid,
    pub project_batch_size: NonZeroUsize,
    pub update_batch_size: NonZeroUsize,
    /// Prepare updates but do not send them
    pub dry_run: bool,
    pub unmatched_export_path: Option<PathBuf>,
}

impl SyncOptions {
    pub fn from_config(config: &SyncConfig, dry_run: bool) -> Self {
        Self {
            layer_item_id: config.arcgis.layer_item_id.clone(),
            cabinet_id_fields: config.cabinet_id_fields.clone(),
            target_wkid: config.target_wkid,
            project_batch_size: config.project_batch_size,
            update_batch_size: config.update_batch_size,
            dry_run,
            unmatched_export_path: config.unmatched_export_path.clone(),
        }
    }
}

/// What a completed pipeline produced besides its counters
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub unmatched: Vec<CabinetKey>,
    pub dropped_null_geometry: Vec<CabinetKey>,
    pub write_report: WriteReport,
    pub export_path: Option<PathBuf>,
}

/// Typed result of a whole run; the binary maps it to an exit status
#[derive(Debug)]
pub enum RunOutcome {
    /// Every usable feature was written
    Success,
    /// Completed, with business-level gaps or rejected batches
    PartialSuccess {
        unmatched: usize,
        dropped_null_geometry: usize,
        batches_failed: usize,
    },
    /// Aborted by an unrecoverable error
    Fatal { stage: RunStage, error: SyncError },
}

impl RunOutcome {
    fn from_output(output: &PipelineOutput) -> Self {
        let unmatched = output.unmatched.len();
        let dropped_null_geometry = output.dropped_null_geometry.len();
        let batches_failed = output.write_report.failed();

        if unmatched == 0 && dropped_null_geometry == 0 && batches_failed == 0 {
            RunOutcome::Success
        } else {
            RunOutcome::PartialSuccess {
                unmatched,
                dropped_null_geometry,
                batches_failed,
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RunOutcome::Fatal { .. })
    }

    /// 0 for completed runs (even partial), 1 for fatal ones
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            1
        } else {
            0
        }
    }
}

/// The stage components wired to their remote collaborators
pub struct SyncPipeline<'a> {
    source: &'a dyn FeatureSource,
    projector: &'a dyn ProjectionService,
    store: &'a dyn RecordStore,
    options: SyncOptions,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        source: &'a dyn FeatureSource,
        projector: &'a dyn ProjectionService,
        store: &'a dyn RecordStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            projector,
            store,
            options,
        }
    }

    /// Run every stage, recording counters into `metrics` as they become known.
    pub async fn run(&self, metrics: &mut RunMetrics) -> Result<PipelineOutput, StageFailure> {
        info!("==== Active Cabinet Sync starting ====");

        // EXTRACTING
        let stage = RunStage::Extracting;
        let layer = self
            .source
            .open_layer(&self.options.layer_item_id)
            .await
            .map_err(|e| StageFailure::new(stage, e))?;
        let source_wkid = layer
            .spatial_reference
            .ok_or_else(|| StageFailure::new(stage, SyncError::UnknownSpatialReference))?;

        let features = self
            .source
            .query_features(&layer)
            .await
            .map_err(|e| StageFailure::new(stage, e))?;
        info!(count = features.len(), wkid = %source_wkid, "Active cabinet features retrieved");

        let extraction = extract_usable(&features, &self.options.cabinet_id_fields);
        metrics.usable = extraction.usable();
        metrics.skipped_no_geometry = extraction.skipped_no_geometry;
        metrics.skipped_no_id = extraction.skipped_no_id;
        info!(
            usable = extraction.usable(),
            skipped_no_geometry = extraction.skipped_no_geometry,
            skipped_no_id = extraction.skipped_no_id,
            "Cabinets usable"
        );

        // PROJECTING
        let projected = project_points(
            self.projector,
            &extraction.points,
            source_wkid,
            self.options.target_wkid,
            self.options.project_batch_size,
        )
        .await
        .map_err(|e| StageFailure::new(RunStage::Projecting, e))?;

        if projected.len() != extraction.keys.len() {
            return Err(StageFailure::new(
                RunStage::Projecting,
                SyncError::ProjectionMismatch {
                    expected: extraction.keys.len(),
                    projected: projected.len(),
                },
            ));
        }

        // INDEXING
        let index = build_remote_index(self.store)
            .await
            .map_err(|e| StageFailure::new(RunStage::Indexing, e))?;
        metrics.qb_indexed = index.len();

        // MATCHING
        let matched = build_updates(&extraction.keys, &projected, &index)
            .map_err(|e| StageFailure::new(RunStage::Matching, e))?;
        metrics.updates = matched.updates.len();
        metrics.unmatched = matched.unmatched.len();
        metrics.dropped_null_geometry = matched.dropped_null_geometry.len();

        // WRITING
        let write_report = if self.options.dry_run {
            warn!(updates = matched.updates.len(), "Dry run, skipping write-back");
            WriteReport::not_attempted(matched.updates.len(), self.options.update_batch_size)
        } else {
            write_in_batches(self.store, &matched.updates, self.options.update_batch_size).await
        };
        metrics.updates_applied = write_report.records_applied();
        metrics.batches_attempted = write_report.attempted();
        metrics.batches_failed = write_report.failed();

        let export_path = self.export(&matched.unmatched);

        info!("==== Active Cabinet Sync finished ====");

        Ok(PipelineOutput {
            unmatched: matched.unmatched,
            dropped_null_geometry: matched.dropped_null_geometry,
            write_report,
            export_path,
        })
    }

    /// Writes already happened, so an export failure is only logged.
    fn export(&self, unmatched: &[CabinetKey]) -> Option<PathBuf> {
        let template = self.options.unmatched_export_path.as_ref()?;
        match export_unmatched(template, unmatched, Local::now()) {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, path = %template.display(), "Failed to export unmatched cabinets");
                None
            }
        }
    }
}

/// Close out a run: record any fatal error, emit the summary to `out`, and
/// translate the result into a [`RunOutcome`].
///
/// Consumes the reporter, so the summary is emitted exactly once.
pub fn finish_run<W: Write>(
    mut reporter: RunReporter,
    result: Result<PipelineOutput, StageFailure>,
    out: &mut W,
) -> (RunOutcome, RunSummary) {
    let (outcome, failed_stage) = match result {
        Ok(output) => (RunOutcome::from_output(&output), None),
        Err(StageFailure { stage, error }) => {
            reporter.record_error();
            error!(stage = %stage, kind = ?error.kind(), error = %error, "Sync run failed");
            (RunOutcome::Fatal { stage, error }, Some(stage))
        }
    };

    let summary = reporter.finish(failed_stage);
    if let Err(e) = summary.emit(out) {
        error!(error = %e, "Failed to write run summary");
    }

    (outcome, summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Success.exit_code(), 0);
        assert_eq!(
            RunOutcome::PartialSuccess {
                unmatched: 4,
                dropped_null_geometry: 0,
                batches_failed: 1
            }
            .exit_code(),
            0
        );
        assert_eq!(
            RunOutcome::Fatal {
                stage: RunStage::Init,
                error: SyncError::MissingEnv("QB_TOKEN".into())
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_finish_run_on_failure_emits_once() {
        let reporter = RunReporter::start();
        let mut out = Vec::new();
        let (outcome, summary) = finish_run(
            reporter,
            Err(StageFailure::new(
                RunStage::Init,
                SyncError::MissingEnv("QB_TOKEN".into()),
            )),
            &mut out,
        );

        assert!(outcome.is_fatal());
        assert_eq!(summary.errors, 1);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("\"failed_stage\":\"INIT\""));
    }

    #[test]
    fn test_outcome_from_output() {
        assert!(matches!(
            RunOutcome::from_output(&PipelineOutput::default()),
            RunOutcome::Success
        ));
        let output = PipelineOutput {
            unmatched: vec![CabinetKey::parse("X").unwrap()],
            ..Default::default()
        };
        assert!(matches!(
            RunOutcome::from_output(&output),
            RunOutcome::PartialSuccess { unmatched: 1, .. }
        ));
    }
}
