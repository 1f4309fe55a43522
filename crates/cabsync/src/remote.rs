//! Seams to the two external systems
//!
//! The pipeline only talks to these traits. [`crate::arcgis::ArcGisClient`]
//! implements the geospatial side and [`crate::quickbase::QuickbaseClient`]
//! the system of record. Tests substitute in-memory implementations.

use async_trait::async_trait;
use cabsync_common::types::{ProjectedPoint, RecordId, SourcePoint, UpdateRecord, Wkid};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::Result;

// ============================================================================
// Geospatial provider
// ============================================================================

/// A feature layer resolved from its catalog item
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayer {
    /// Layer REST endpoint
    pub url: String,
    /// Declared spatial reference, when the layer advertises one
    pub spatial_reference: Option<Wkid>,
}

/// Point geometry as delivered by the provider; either coordinate may be absent
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct PointGeometry {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
}

impl PointGeometry {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }
}

/// One geospatial record: its attributes plus an optional point
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Feature {
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<PointGeometry>,
}

impl Feature {
    pub fn new(attributes: Map<String, Value>, geometry: Option<PointGeometry>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }

    /// The feature's point when both coordinates are present
    pub fn point(&self) -> Option<SourcePoint> {
        let geometry = self.geometry?;
        Some(SourcePoint::new(geometry.x?, geometry.y?))
    }
}

/// Read access to the geospatial source of record
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Resolve a layer from its catalog item id
    async fn open_layer(&self, item_id: &str) -> Result<FeatureLayer>;

    /// Fetch every feature of the layer, with geometry
    async fn query_features(&self, layer: &FeatureLayer) -> Result<Vec<Feature>>;
}

/// Remote point projection
#[async_trait]
pub trait ProjectionService: Send + Sync {
    /// Project one request worth of points. The output must have the same
    /// length and order as `points`.
    async fn project(
        &self,
        points: &[SourcePoint],
        from: Wkid,
        to: Wkid,
    ) -> Result<Vec<ProjectedPoint>>;
}

// ============================================================================
// System of record
// ============================================================================

/// One raw row of the (record id, cabinet key) index query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexRow {
    pub record_id: Option<RecordId>,
    pub cabinet_key: Option<Value>,
}

/// Acknowledgement of an accepted write batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteAck {
    /// Records the store reports as processed, if it says
    pub processed: Option<u64>,
    /// Per-line errors reported inside an accepted batch
    pub line_errors: usize,
}

/// Record-oriented access to the business database
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return (record id, cabinet key) for every row. Paging is the
    /// implementation's concern.
    async fn query_index_rows(&self) -> Result<Vec<IndexRow>>;

    /// Submit one batch of coordinate updates
    async fn write_batch(&self, batch: &[UpdateRecord]) -> Result<WriteAck>;
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Accept numbers or numeric strings; anything else (null, "NaN", objects)
/// becomes `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
    .filter(|f| f.is_finite()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
