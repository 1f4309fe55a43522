//! ArcGIS REST request and response types
//!
//! The REST API answers most failures with HTTP 200 and an `error` object in
//! the body, so every response goes through [`parse_response`].

use cabsync_common::types::{ProjectedPoint, SourcePoint, Wkid};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::remote::{Feature, PointGeometry};

/// `{"error": {...}}` body
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<String>,
}

impl From<ErrorBody> for SyncError {
    fn from(body: ErrorBody) -> Self {
        let message = if body.details.is_empty() {
            body.message
        } else {
            format!("{} ({})", body.message, body.details.join("; "))
        };
        SyncError::ArcGis {
            code: body.code,
            message,
        }
    }
}

/// Decode a response body, surfacing an embedded error payload first.
pub fn parse_response<T: DeserializeOwned>(mut body: Value) -> Result<T> {
    if let Some(error) = body.get_mut("error").map(Value::take) {
        let error: ErrorBody = serde_json::from_value(error)?;
        return Err(error.into());
    }
    Ok(serde_json::from_value(body)?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// The fields of a catalog item this client reads
#[derive(Debug, Clone, Deserialize)]
pub struct ItemResponse {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    #[serde(default)]
    pub wkid: Option<u32>,
    #[serde(default)]
    pub latest_wkid: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    #[serde(default)]
    pub spatial_reference: Option<SpatialReference>,
}

/// Layer metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerInfo {
    #[serde(default)]
    pub extent: Option<Extent>,
}

impl LayerInfo {
    /// Spatial reference declared on the layer extent, if any
    pub fn wkid(&self) -> Option<Wkid> {
        let sr = self.extent.as_ref()?.spatial_reference.as_ref()?;
        sr.wkid.or(sr.latest_wkid).filter(|w| *w != 0).map(Wkid)
    }
}

/// One page of a feature query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub exceeded_transfer_limit: bool,
}

/// `geometries` form field of a projection request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointCollection {
    pub geometry_type: &'static str,
    pub geometries: Vec<XY>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct XY {
    pub x: f64,
    pub y: f64,
}

impl PointCollection {
    pub fn new(points: &[SourcePoint]) -> Self {
        Self {
            geometry_type: "esriGeometryPoint",
            geometries: points.iter().map(|p| XY { x: p.x, y: p.y }).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectResponse {
    #[serde(default)]
    pub geometries: Vec<Option<PointGeometry>>,
}

impl ProjectResponse {
    pub fn into_points(self) -> Vec<ProjectedPoint> {
        self.geometries
            .into_iter()
            .map(|g| {
                let g = g.unwrap_or_default();
                ProjectedPoint { x: g.x, y: g.y }
            })
            .collect()
    }
}
