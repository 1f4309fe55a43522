//! Domain types shared by the sync pipeline and its remote adapters

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CommonError;

/// Number of decimal places kept for written coordinates.
pub const COORDINATE_DECIMALS: i32 = 6;

/// Round a coordinate to [`COORDINATE_DECIMALS`] places.
///
/// Idempotent: rounding an already rounded value returns it unchanged.
pub fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_DECIMALS);
    (value * scale).round() / scale
}

// ============================================================================
// Identity
// ============================================================================

/// Canonical cabinet identifier used to join the geospatial layer with the
/// system-of-record table.
///
/// Always trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CabinetKey(String);

impl CabinetKey {
    /// Trim `raw` and wrap it, or `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Stringify a loosely typed attribute value and parse it as a key.
    ///
    /// Strings are used as-is, numbers and booleans by their display form.
    /// Null yields `None`. Arrays and objects fall back to compact JSON.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Self::parse(s),
            Value::Number(n) => Self::parse(&n.to_string()),
            Value::Bool(b) => Self::parse(&b.to_string()),
            other => Self::parse(&other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CabinetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque internal record identifier in the system of record.
///
/// Kept as the raw JSON value so it is written back exactly as it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Value);

impl RecordId {
    /// Wrap a raw id value. Null is not an id.
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// Numeric field identifier in the system-of-record table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub u32);

impl FieldId {
    /// Key used for this field in request and response cell maps.
    pub fn key(self) -> String {
        self.0.to_string()
    }
}

impl std::str::FromStr for FieldId {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(FieldId)
            .map_err(|_| CommonError::InvalidFieldId(s.to_string()))
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Well-known id of a spatial reference (e.g. 3857, 4326)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wkid(pub u32);

impl Wkid {
    /// WGS 84 geographic coordinates
    pub const WGS84: Wkid = Wkid(4326);

    /// Web Mercator
    pub const WEB_MERCATOR: Wkid = Wkid(3857);
}

impl std::str::FromStr for Wkid {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().parse::<u32>() {
            Ok(0) | Err(_) => Err(CommonError::InvalidSpatialReference(s.to_string())),
            Ok(code) => Ok(Wkid(code)),
        }
    }
}

impl std::fmt::Display for Wkid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in the layer's declared spatial reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourcePoint {
    pub x: f64,
    pub y: f64,
}

impl SourcePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A projected point in the target reference.
///
/// `x` is longitude and `y` latitude when the target is geographic. Either
/// coordinate may be missing when the projection service could not place the
/// input point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl ProjectedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }

    /// A point the projection service returned without usable coordinates
    pub fn empty() -> Self {
        Self::default()
    }

    /// `(latitude, longitude)` when both are present
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        Some((self.y?, self.x?))
    }
}

// ============================================================================
// Write-back
// ============================================================================

/// One coordinate correction for the system of record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub record_id: RecordId,
    pub latitude: f64,
    pub longitude: f64,
}

impl UpdateRecord {
    /// Build an update with both coordinates rounded to [`COORDINATE_DECIMALS`].
    pub fn rounded(record_id: RecordId, latitude: f64, longitude: f64) -> Self {
        Self {
            record_id,
            latitude: round_coordinate(latitude),
            longitude: round_coordinate(longitude),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cabinet_key_trims() {
        let key = CabinetKey::parse("  C-17\t").unwrap();
        assert_eq!(key.as_str(), "C-17");
        assert!(CabinetKey::parse("   ").is_none());
        assert!(CabinetKey::parse("").is_none());
    }

    #[test]
    fn test_cabinet_key_from_value() {
        assert_eq!(CabinetKey::from_value(&json!(1042)).unwrap().as_str(), "1042");
        assert_eq!(CabinetKey::from_value(&json!(" AB ")).unwrap().as_str(), "AB");
        assert!(CabinetKey::from_value(&json!(null)).is_none());
        assert!(CabinetKey::from_value(&json!("")).is_none());
    }

    #[test]
    fn test_record_id_rejects_null() {
        assert!(RecordId::from_value(json!(null)).is_none());
        let id = RecordId::from_value(json!(17)).unwrap();
        assert_eq!(id.to_string(), "17");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!(17));
    }

    #[test]
    fn test_wkid_from_str() {
        assert_eq!("3857".parse::<Wkid>().unwrap(), Wkid::WEB_MERCATOR);
        assert!("0".parse::<Wkid>().is_err());
        assert!("web".parse::<Wkid>().is_err());
    }

    #[test]
    fn test_field_id_from_str() {
        assert_eq!(" 9 ".parse::<FieldId>().unwrap(), FieldId(9));
        assert_eq!(FieldId(10).key(), "10");
        assert!("lat".parse::<FieldId>().is_err());
    }

    #[test]
    fn test_round_coordinate() {
        assert_eq!(round_coordinate(-81.123456789), -81.123457);
        assert_eq!(round_coordinate(28.5), 28.5);
    }

    #[test]
    fn test_round_coordinate_is_idempotent() {
        let samples = [
            -81.379_234_567_1,
            28.538_335_999_9,
            0.000_000_4,
            179.999_999_51,
            -0.5,
            45.123_456_5,
        ];
        for value in samples {
            let once = round_coordinate(value);
            assert_eq!(round_coordinate(once), once, "value {value}");
        }
    }

    #[test]
    fn test_projected_point_lat_lon() {
        assert_eq!(ProjectedPoint::new(-81.0, 28.0).lat_lon(), Some((28.0, -81.0)));
        let partial = ProjectedPoint {
            x: Some(-81.0),
            y: None,
        };
        assert_eq!(partial.lat_lon(), None);
        assert_eq!(ProjectedPoint::empty().lat_lon(), None);
    }

    #[test]
    fn test_update_record_rounds() {
        let update = UpdateRecord::rounded(
            RecordId::from_value(json!(5)).unwrap(),
            28.1234567,
            -81.7654321,
        );
        assert_eq!(update.latitude, 28.123457);
        assert_eq!(update.longitude, -81.765432);
    }
}
