//! Cabsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the cabinet sync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Types**: cabinet keys, spatial references, projected points, update records
//! - **Logging**: `tracing` subscriber configuration shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use cabsync_common::types::CabinetKey;
//!
//! let key = CabinetKey::parse("  CAB-0042 ").unwrap();
//! assert_eq!(key.as_str(), "CAB-0042");
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
