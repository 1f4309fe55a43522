//! Chunked coordinate projection
//!
//! Points are sent to the [`ProjectionService`] in fixed-size chunks to stay
//! under the service's request limit. Results are concatenated in input
//! order. Any chunk failure aborts the whole projection; a partially
//! projected set is never returned.

use std::num::NonZeroUsize;

use cabsync_common::types::{ProjectedPoint, SourcePoint, Wkid};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::remote::ProjectionService;

/// Project `points` from `from` to `to`, preserving order.
///
/// An empty input returns immediately without calling the service.
pub async fn project_points(
    service: &dyn ProjectionService,
    points: &[SourcePoint],
    from: Wkid,
    to: Wkid,
    batch_size: NonZeroUsize,
) -> Result<Vec<ProjectedPoint>> {
    if points.is_empty() {
        debug!("No points to project");
        return Ok(Vec::new());
    }

    let mut projected = Vec::with_capacity(points.len());

    for (chunk_index, chunk) in points.chunks(batch_size.get()).enumerate() {
        let start = chunk_index * batch_size.get();
        let end = start + chunk.len();

        let out = service
            .project(chunk, from, to)
            .await
            .map_err(|e| SyncError::projection(start, end, e.to_string()))?;

        if out.len() != chunk.len() {
            return Err(SyncError::ProjectionMismatch {
                expected: chunk.len(),
                projected: out.len(),
            });
        }

        debug!(start = start + 1, end, "Projected chunk");
        projected.extend(out);
    }

    info!(
        points = projected.len(),
        from = %from,
        to = %to,
        "Projection complete"
    );

    Ok(projected)
}
