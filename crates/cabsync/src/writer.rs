//! Best-effort batched write-back
//!
//! Updates are split into fixed-size batches in original order. A rejected
//! batch is logged and recorded, then the next batch is sent. Nothing is
//! retried within a run.

use std::num::NonZeroUsize;

use cabsync_common::types::UpdateRecord;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::remote::RecordStore;

/// Result of one write batch. Ranges are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// The store accepted the batch
    Applied {
        first: usize,
        last: usize,
        line_errors: usize,
    },
    /// The store rejected the batch or the request failed
    Rejected {
        first: usize,
        last: usize,
        status: Option<u16>,
        detail: String,
    },
    /// The batch was prepared but deliberately not sent (dry run)
    NotAttempted { first: usize, last: usize },
}

impl BatchOutcome {
    /// Number of update records in the batch
    pub fn record_count(&self) -> usize {
        let (first, last) = self.range();
        last + 1 - first
    }

    pub fn range(&self) -> (usize, usize) {
        match self {
            BatchOutcome::Applied { first, last, .. }
            | BatchOutcome::Rejected { first, last, .. }
            | BatchOutcome::NotAttempted { first, last } => (*first, *last),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, BatchOutcome::Applied { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, BatchOutcome::Rejected { .. })
    }
}

/// Per-batch outcomes of the write stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteReport {
    pub batches: Vec<BatchOutcome>,
}

impl WriteReport {
    /// Report for a run that prepared updates but did not send them
    pub fn not_attempted(updates: usize, batch_size: NonZeroUsize) -> Self {
        let batches = batch_ranges(updates, batch_size)
            .map(|(first, last)| BatchOutcome::NotAttempted { first, last })
            .collect();
        Self { batches }
    }

    /// Batches actually sent to the store
    pub fn attempted(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| !matches!(b, BatchOutcome::NotAttempted { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().filter(|b| b.is_rejected()).count()
    }

    /// Update records in accepted batches, less the rows the store
    /// reported as line errors
    pub fn records_applied(&self) -> usize {
        self.batches
            .iter()
            .map(|b| match b {
                BatchOutcome::Applied { line_errors, .. } => {
                    b.record_count().saturating_sub(*line_errors)
                }
                _ => 0,
            })
            .sum()
    }
}

/// 1-based inclusive ranges for `total` items split into `batch_size` chunks
fn batch_ranges(total: usize, batch_size: NonZeroUsize) -> impl Iterator<Item = (usize, usize)> {
    let size = batch_size.get();
    (0..total)
        .step_by(size)
        .map(move |start| (start + 1, (start + size).min(total)))
}

/// Send `updates` to the store in batches of `batch_size`.
///
/// Every batch is attempted regardless of earlier failures.
pub async fn write_in_batches(
    store: &dyn RecordStore,
    updates: &[UpdateRecord],
    batch_size: NonZeroUsize,
) -> WriteReport {
    let mut report = WriteReport::default();

    if updates.is_empty() {
        info!("No updates to send");
        return report;
    }

    for (chunk, (first, last)) in updates
        .chunks(batch_size.get())
        .zip(batch_ranges(updates.len(), batch_size))
    {
        let outcome = match store.write_batch(chunk).await {
            Ok(ack) => {
                if ack.line_errors > 0 {
                    warn!(first, last, line_errors = ack.line_errors, "Batch accepted with line errors");
                } else {
                    info!(first, last, "Updated records");
                }
                BatchOutcome::Applied {
                    first,
                    last,
                    line_errors: ack.line_errors,
                }
            }
            Err(err) => {
                let status = match &err {
                    SyncError::Quickbase { status, .. } => Some(*status),
                    SyncError::Http(e) => e.status().map(|s| s.as_u16()),
                    _ => None,
                };
                error!(first, last, status = ?status, error = %err, "Batch failed, continuing");
                BatchOutcome::Rejected {
                    first,
                    last,
                    status,
                    detail: err.to_string(),
                }
            }
        };
        report.batches.push(outcome);
    }

    info!(
        batches = report.batches.len(),
        failed = report.failed(),
        applied = report.records_applied(),
        "Write stage complete"
    );

    report
}
