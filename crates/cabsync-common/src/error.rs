//! Error types shared across the cabsync workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while building or validating shared domain values
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid spatial reference: {0}")]
    InvalidSpatialReference(String),

    #[error("Invalid field id: {0}")]
    InvalidFieldId(String),

    #[error("Invalid batch size: {0} (must be greater than zero)")]
    InvalidBatchSize(usize),
}
