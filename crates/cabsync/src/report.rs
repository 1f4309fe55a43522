//! Run metrics and the end-of-run summary
//!
//! The scheduler that launches the job reads two stdout lines:
//!
//! ```text
//! PAD_RESULT|status=SUCCESS|usable=412|qb_indexed=409|updates=405|unmatched=6|...
//! PAD_SUMMARY={"status":"OK","started_utc":"2026-02-09T15:30:45Z",...}
//! ```
//!
//! [`RunReporter::finish`] consumes the reporter, so a run can produce at
//! most one [`RunSummary`].

use std::io::Write;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::pipeline::RunStage;

/// Prefix of the delimited status line
pub const RESULT_LINE_PREFIX: &str = "PAD_RESULT";

/// Prefix of the JSON summary line
pub const SUMMARY_LINE_PREFIX: &str = "PAD_SUMMARY=";

/// Counters accumulated across one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    /// Features with both a point and a cabinet key
    pub usable: usize,
    /// Distinct keys in the system-of-record index
    pub qb_indexed: usize,
    /// Update records prepared
    pub updates: usize,
    pub unmatched: usize,
    pub dropped_null_geometry: usize,
    pub skipped_no_geometry: usize,
    pub skipped_no_id: usize,
    /// Update records in batches the store accepted
    pub updates_applied: usize,
    pub batches_attempted: usize,
    pub batches_failed: usize,
    /// Fatal errors; at most one per run
    #[serde(skip)]
    pub errors: usize,
}

/// Overall status reported to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SummaryStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "WARN")]
    Warn,
}

impl SummaryStatus {
    pub fn from_errors(errors: usize) -> Self {
        if errors == 0 {
            SummaryStatus::Ok
        } else {
            SummaryStatus::Warn
        }
    }
}

/// Tracks timing and counters from process start until the summary is emitted
#[derive(Debug)]
pub struct RunReporter {
    started_utc: DateTime<Utc>,
    started: Instant,
    metrics: RunMetrics,
}

impl RunReporter {
    pub fn start() -> Self {
        Self {
            started_utc: Utc::now(),
            started: Instant::now(),
            metrics: RunMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut RunMetrics {
        &mut self.metrics
    }

    /// Record a fatal error
    pub fn record_error(&mut self) {
        self.metrics.errors += 1;
    }

    /// Close the run and snapshot its counters.
    ///
    /// `failed_stage` is the stage a fatal error escaped from, `None` on success.
    pub fn finish(self, failed_stage: Option<RunStage>) -> RunSummary {
        let ended_utc = Utc::now();
        let duration_sec = self.started.elapsed().as_secs_f64().round() as u64;

        RunSummary {
            status: SummaryStatus::from_errors(self.metrics.errors),
            started_utc: self.started_utc,
            ended_utc,
            duration_sec,
            errors: self.metrics.errors,
            failed_stage,
            active_cabinets: self.metrics,
        }
    }
}

fn utc_seconds<S>(ts: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Final, immutable record of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub status: SummaryStatus,
    #[serde(serialize_with = "utc_seconds")]
    pub started_utc: DateTime<Utc>,
    #[serde(serialize_with = "utc_seconds")]
    pub ended_utc: DateTime<Utc>,
    pub duration_sec: u64,
    pub active_cabinets: RunMetrics,
    pub errors: usize,
    pub failed_stage: Option<RunStage>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.failed_stage.is_none()
    }

    /// Single delimited line for lightweight scraping
    pub fn result_line(&self) -> String {
        let m = &self.active_cabinets;
        let status = if self.succeeded() { "SUCCESS" } else { "FAILURE" };
        format!(
            "{RESULT_LINE_PREFIX}|status={status}|usable={}|qb_indexed={}|updates={}|unmatched={}\
             |dropped_null_geometry={}|updates_applied={}|batches_failed={}|errors={}",
            m.usable,
            m.qb_indexed,
            m.updates,
            m.unmatched,
            m.dropped_null_geometry,
            m.updates_applied,
            m.batches_failed,
            self.errors,
        )
    }

    /// Compact JSON line
    pub fn json_line(&self) -> serde_json::Result<String> {
        Ok(format!("{SUMMARY_LINE_PREFIX}{}", serde_json::to_string(self)?))
    }

    /// Write both lines to `out`
    pub fn emit<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let json = self.json_line().map_err(std::io::Error::other)?;
        writeln!(out, "{}", self.result_line())?;
        writeln!(out, "{json}")?;
        out.flush()
    }
}
