//! ArcGIS REST adapter
//!
//! Implements [`crate::remote::FeatureSource`] over a portal feature layer and
//! [`crate::remote::ProjectionService`] over a geometry service.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::ArcGisClient;
