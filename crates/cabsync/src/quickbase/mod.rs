//! Quickbase adapter
//!
//! Implements [`crate::remote::RecordStore`] over the Quickbase JSON API.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::QuickbaseClient;
