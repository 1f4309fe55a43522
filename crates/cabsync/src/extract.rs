//! Identity and geometry extraction
//!
//! Turns raw layer features into two positionally aligned sequences: the
//! cabinet keys and the source points to project. Features without a point
//! or without a usable identity are counted and left out.

use cabsync_common::types::{CabinetKey, SourcePoint};
use serde_json::{Map, Value};
use tracing::debug;

use crate::remote::Feature;

/// Try each candidate in order and return the first attempt that succeeds.
pub fn first_success<I, T, F>(candidates: I, mut attempt: F) -> Option<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Option<T>,
{
    candidates.into_iter().find_map(|candidate| attempt(candidate))
}

/// Derive the cabinet key from a feature's attributes.
///
/// Fields are tried in `candidate_fields` order; the first one whose value
/// stringifies to a non-empty trimmed string wins.
pub fn extract_cabinet_key<S>(
    attributes: &Map<String, Value>,
    candidate_fields: &[S],
) -> Option<CabinetKey>
where
    S: AsRef<str>,
{
    first_success(candidate_fields, |field| {
        let name: &str = field.as_ref();
        attributes.get(name).and_then(CabinetKey::from_value)
    })
}

/// Usable features, split into aligned keys and points
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub keys: Vec<CabinetKey>,
    pub points: Vec<SourcePoint>,
    pub skipped_no_geometry: usize,
    pub skipped_no_id: usize,
}

impl Extraction {
    /// Number of features that made it into the pipeline
    pub fn usable(&self) -> usize {
        self.keys.len()
    }
}

/// Extract every usable feature, preserving input order.
///
/// Geometry is checked before identity, so a feature missing both is counted
/// once, under `skipped_no_geometry`.
pub fn extract_usable<S>(features: &[Feature], candidate_fields: &[S]) -> Extraction
where
    S: AsRef<str>,
{
    let mut extraction = Extraction::default();

    for feature in features {
        let Some(point) = feature.point() else {
            extraction.skipped_no_geometry += 1;
            continue;
        };

        let Some(key) = extract_cabinet_key(&feature.attributes, candidate_fields) else {
            extraction.skipped_no_id += 1;
            continue;
        };

        extraction.keys.push(key);
        extraction.points.push(point);
    }

    debug!(
        usable = extraction.usable(),
        skipped_no_geometry = extraction.skipped_no_geometry,
        skipped_no_id = extraction.skipped_no_id,
        "Extraction complete"
    );

    extraction
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::remote::PointGeometry;
    use serde_json::json;

    const FIELDS: &[&str] = &["CabinetID", "cab_id", "Cabinet_ID"];

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn feature(value: Value, point: Option<(f64, f64)>) -> Feature {
        Feature::new(attrs(value), point.map(|(x, y)| PointGeometry::new(x, y)))
    }

    #[test]
    fn test_first_candidate_wins() {
        let a = attrs(json!({"CabinetID": "A-1", "cab_id": "B-2"}));
        assert_eq!(extract_cabinet_key(&a, FIELDS).unwrap().as_str(), "A-1");
    }

    #[test]
    fn test_blank_candidates_fall_through() {
        let a = attrs(json!({"CabinetID": "   ", "cab_id": null, "Cabinet_ID": " C-3 "}));
        assert_eq!(extract_cabinet_key(&a, FIELDS).unwrap().as_str(), "C-3");
    }

    #[test]
    fn test_numeric_identity_is_stringified() {
        let a = attrs(json!({"cab_id": 4471}));
        assert_eq!(extract_cabinet_key(&a, FIELDS).unwrap().as_str(), "4471");
    }

    #[test]
    fn test_no_identity() {
        let a = attrs(json!({"Name": "Cabinet on Main", "CabinetID": ""}));
        assert!(extract_cabinet_key(&a, FIELDS).is_none());
    }

    #[test]
    fn test_field_names_are_case_sensitive() {
        let a = attrs(json!({"cabinetid": "X"}));
        assert!(extract_cabinet_key(&a, FIELDS).is_none());
    }

    #[test]
    fn test_extract_usable_keeps_alignment() {
        let features = vec![
            feature(json!({"CabinetID": "A"}), Some((1.0, 2.0))),
            feature(json!({"CabinetID": "B"}), None),
            feature(json!({"Other": "C"}), Some((5.0, 6.0))),
            feature(json!({"cab_id": "D"}), Some((7.0, 8.0))),
            feature(json!({}), None),
        ];

        let extraction = extract_usable(&features, FIELDS);

        let keys: Vec<&str> = extraction.keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["A", "D"]);
        assert_eq!(
            extraction.points,
            vec![SourcePoint::new(1.0, 2.0), SourcePoint::new(7.0, 8.0)]
        );
        assert_eq!(extraction.usable(), 2);
        assert_eq!(extraction.skipped_no_geometry, 2);
        assert_eq!(extraction.skipped_no_id, 1);
    }

    #[test]
    fn test_first_success_stops_early() {
        let mut calls = 0;
        let found = first_success([1, 2, 3, 4], |n| {
            calls += 1;
            (n % 2 == 0).then_some(n * 10)
        });
        assert_eq!(found, Some(20));
        assert_eq!(calls, 2);
    }
}
