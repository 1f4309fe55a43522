//! Join extracted keys and projected points against the remote index
//!
//! Each input pair lands in exactly one bucket:
//! - **update**: key indexed, both coordinates present
//! - **unmatched**: key not indexed
//! - **dropped**: key indexed but the projected point is incomplete
//!
//! Dropped pairs are a geometry defect, not an identity defect, and are
//! counted separately from unmatched keys.

use cabsync_common::types::{CabinetKey, ProjectedPoint, UpdateRecord};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::index::RemoteIndex;

/// Outcome of matching one run's features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub updates: Vec<UpdateRecord>,
    pub unmatched: Vec<CabinetKey>,
    pub dropped_null_geometry: Vec<CabinetKey>,
}

impl MatchResult {
    /// Total number of input pairs represented
    pub fn accounted(&self) -> usize {
        self.updates.len() + self.unmatched.len() + self.dropped_null_geometry.len()
    }
}

/// Build update records for every matched key with a complete point.
///
/// `keys` and `points` must be the same length; a mismatch means projection
/// lost its positional alignment and is fatal.
pub fn build_updates(
    keys: &[CabinetKey],
    points: &[ProjectedPoint],
    index: &RemoteIndex,
) -> Result<MatchResult> {
    if keys.len() != points.len() {
        return Err(SyncError::ProjectionMismatch {
            expected: keys.len(),
            projected: points.len(),
        });
    }

    let mut result = MatchResult::default();

    for (key, point) in keys.iter().zip(points) {
        let Some(record_id) = index.get(key) else {
            result.unmatched.push(key.clone());
            continue;
        };

        match point.lat_lon() {
            Some((lat, lon)) => result
                .updates
                .push(UpdateRecord::rounded(record_id.clone(), lat, lon)),
            None => {
                debug!(cabinet = %key, "Projected point missing a coordinate, skipping");
                result.dropped_null_geometry.push(key.clone());
            }
        }
    }

    debug_assert_eq!(result.accounted(), keys.len());

    info!(
        updates = result.updates.len(),
        unmatched = result.unmatched.len(),
        dropped_null_geometry = result.dropped_null_geometry.len(),
        "Updates prepared"
    );

    Ok(result)
}
