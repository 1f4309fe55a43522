//! Error types for the cabinet sync job
//!
//! Every variant that escapes a pipeline stage is fatal for the run. Write
//! batch rejections are not errors; they are reported as
//! [`crate::writer::BatchOutcome`] values instead.

use cabsync_common::CommonError;
use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// When a fatal error can occur relative to the first remote write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// Configuration, layer lookup, or integrity checks before any write
    Startup,
    /// A remote call failed after the run was under way
    MidRun,
}

/// Fatal conditions for a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// A required environment variable is missing or empty
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    /// A configuration value could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The feature layer catalog item could not be resolved
    #[error("Could not find feature layer item '{item_id}': {reason}")]
    LayerNotFound { item_id: String, reason: String },

    /// The layer does not declare a usable spatial reference
    #[error("Could not determine layer spatial reference for projection")]
    UnknownSpatialReference,

    /// The geospatial portal rejected a request with an error payload
    #[error("ArcGIS error {code}: {message}")]
    ArcGis { code: i64, message: String },

    /// A projection chunk failed; partial projections are never trusted
    #[error("Projection failed for points {start}-{end}: {reason}")]
    Projection {
        start: usize,
        end: usize,
        reason: String,
    },

    /// Projected output count does not match the input count
    #[error("Projection mismatch: {projected} projected points for {expected} cabinet ids")]
    ProjectionMismatch { expected: usize, projected: usize },

    /// The system of record rejected a non-write request
    #[error("Quickbase request failed with status {status}: {body}")]
    Quickbase { status: u16, body: String },

    #[error("Invalid value: {0}")]
    Common(#[from] CommonError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
}

impl SyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a projection chunk failure covering `start..end` (zero based, exclusive end)
    pub fn projection(start: usize, end: usize, reason: impl Into<String>) -> Self {
        Self::Projection {
            start: start + 1,
            end,
            reason: reason.into(),
        }
    }

    /// Classify the error for diagnostics
    pub fn kind(&self) -> FatalKind {
        match self {
            SyncError::MissingEnv(_)
            | SyncError::Config(_)
            | SyncError::Common(_)
            | SyncError::LayerNotFound { .. }
            | SyncError::UnknownSpatialReference
            | SyncError::ProjectionMismatch { .. } => FatalKind::Startup,
            SyncError::ArcGis { .. }
            | SyncError::Projection { .. }
            | SyncError::Quickbase { .. }
            | SyncError::Http(_)
            | SyncError::Json(_)
            | SyncError::Io(_)
            | SyncError::Csv(_) => FatalKind::MidRun,
        }
    }
}
