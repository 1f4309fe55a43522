//! Configuration for a sync run
//!
//! Secrets and endpoints come from the environment (optionally seeded from a
//! `.env` file). Table and field identifiers default to the production
//! cabinet table but can be overridden for staging copies.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use cabsync_common::types::{FieldId, Wkid};

use crate::error::{Result, SyncError};

// ============================================================================
// Defaults
// ============================================================================

/// Realm hostname sent with every Quickbase request.
pub const DEFAULT_QB_REALM: &str = "omnifiber.quickbase.com";

/// Quickbase JSON API base URL.
pub const DEFAULT_QB_API_URL: &str = "https://api.quickbase.com/v1";

/// Active Cabinets table.
pub const DEFAULT_QB_TABLE_ID: &str = "bts8av3cw";

pub const DEFAULT_QB_RECORD_ID_FID: FieldId = FieldId(3);
pub const DEFAULT_QB_CABINET_ID_FID: FieldId = FieldId(6);
pub const DEFAULT_QB_LAT_FID: FieldId = FieldId(9);
pub const DEFAULT_QB_LON_FID: FieldId = FieldId(10);

/// Active Cabinets feature layer item.
pub const DEFAULT_LAYER_ITEM_ID: &str = "8a42d8a5d7b649109101b15647a2235d";

/// Geometry service used for projection.
pub const DEFAULT_GEOMETRY_URL: &str =
    "https://utility.arcgisonline.com/arcgis/rest/services/Geometry/GeometryServer";

/// Attribute names tried, in order, for the cabinet id.
pub const DEFAULT_CABINET_ID_FIELDS: &[&str] = &["CabinetID", "cab_id", "Cabinet_ID"];

pub const DEFAULT_UPDATE_BATCH_SIZE: usize = 200;
pub const DEFAULT_PROJECT_BATCH_SIZE: usize = 200;

/// Transport timeout for every remote call.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Special value of `UNMATCHED_EXPORT_PATH` selecting the documents folder.
pub const EXPORT_PATH_DEFAULT_TOKEN: &str = "DEFAULT";

/// File name used when the export path is `DEFAULT`.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "unmatched_cabinets.csv";

/// Geospatial portal connection
#[derive(Debug, Clone)]
pub struct ArcGisConfig {
    pub portal_url: String,
    pub username: String,
    pub password: String,
    pub layer_item_id: String,
    pub geometry_url: String,
}

/// System-of-record connection and table layout
#[derive(Debug, Clone)]
pub struct QuickbaseConfig {
    pub api_url: String,
    pub realm: String,
    pub user_token: String,
    pub table_id: String,
    pub record_id_field: FieldId,
    pub cabinet_id_field: FieldId,
    pub latitude_field: FieldId,
    pub longitude_field: FieldId,
}

/// Full configuration for one run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub arcgis: ArcGisConfig,
    pub quickbase: QuickbaseConfig,
    /// Attribute names tried in priority order for the cabinet id
    pub cabinet_id_fields: Vec<String>,
    pub target_wkid: Wkid,
    pub project_batch_size: NonZeroUsize,
    pub update_batch_size: NonZeroUsize,
    pub http_timeout: Duration,
    /// Resolved export path template, `None` disables the export
    pub unmatched_export_path: Option<PathBuf>,
}

impl SyncConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| get(name).ok_or_else(|| SyncError::MissingEnv(name.to_string()));

        let arcgis = ArcGisConfig {
            portal_url: trim_slash(required("ARCGIS_PORTAL_URL")?),
            username: required("OMNI_GIS_USER")?,
            password: required("OMNI_GIS_PASS")?,
            layer_item_id: get("ARCGIS_LAYER_ITEM_ID")
                .unwrap_or_else(|| DEFAULT_LAYER_ITEM_ID.to_string()),
            geometry_url: trim_slash(
                get("ARCGIS_GEOMETRY_URL").unwrap_or_else(|| DEFAULT_GEOMETRY_URL.to_string()),
            ),
        };

        let quickbase = QuickbaseConfig {
            user_token: required("QB_TOKEN")?,
            api_url: trim_slash(get("QB_API_URL").unwrap_or_else(|| DEFAULT_QB_API_URL.to_string())),
            realm: get("QB_REALM").unwrap_or_else(|| DEFAULT_QB_REALM.to_string()),
            table_id: get("QB_TABLE_ID").unwrap_or_else(|| DEFAULT_QB_TABLE_ID.to_string()),
            record_id_field: parse_or(get("QB_RECORD_ID_FID"), DEFAULT_QB_RECORD_ID_FID)?,
            cabinet_id_field: parse_or(get("QB_CABINET_ID_FID"), DEFAULT_QB_CABINET_ID_FID)?,
            latitude_field: parse_or(get("QB_LAT_FID"), DEFAULT_QB_LAT_FID)?,
            longitude_field: parse_or(get("QB_LON_FID"), DEFAULT_QB_LON_FID)?,
        };

        let cabinet_id_fields = match get("CABINET_ID_FIELDS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CABINET_ID_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        };

        let config = SyncConfig {
            arcgis,
            quickbase,
            cabinet_id_fields,
            target_wkid: parse_or(get("TARGET_WKID"), Wkid::WGS84)?,
            project_batch_size: batch_size(get("PROJECT_BATCH_SIZE"), DEFAULT_PROJECT_BATCH_SIZE)?,
            update_batch_size: batch_size(get("QB_UPDATE_BATCH_SIZE"), DEFAULT_UPDATE_BATCH_SIZE)?,
            http_timeout: Duration::from_secs(parse_or(
                get("CABSYNC_HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            unmatched_export_path: get("UNMATCHED_EXPORT_PATH")
                .map(|raw| resolve_export_path(&raw))
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.cabinet_id_fields.is_empty() {
            return Err(SyncError::config("CABINET_ID_FIELDS lists no field names"));
        }

        if self.http_timeout.is_zero() {
            return Err(SyncError::config(
                "CABSYNC_HTTP_TIMEOUT_SECS must be greater than 0",
            ));
        }

        let q = &self.quickbase;
        let fields = [
            q.record_id_field,
            q.cabinet_id_field,
            q.latitude_field,
            q.longitude_field,
        ];
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].contains(field) {
                return Err(SyncError::config(format!(
                    "Quickbase field id {field} is configured for more than one column"
                )));
            }
        }

        Ok(())
    }
}

/// Expand the `DEFAULT` token to `~/Documents/unmatched_cabinets.csv`.
fn resolve_export_path(raw: &str) -> Result<PathBuf> {
    if raw.trim() == EXPORT_PATH_DEFAULT_TOKEN {
        let home = dirs::home_dir()
            .ok_or_else(|| SyncError::config("Could not determine home directory for export"))?;
        Ok(home.join("Documents").join(DEFAULT_EXPORT_FILE_NAME))
    } else {
        Ok(PathBuf::from(raw.trim()))
    }
}

fn trim_slash(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_or<T>(raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| SyncError::config(format!("invalid value '{value}': {e}"))),
        None => Ok(default),
    }
}

fn batch_size(raw: Option<String>, default: usize) -> Result<NonZeroUsize> {
    let size: usize = parse_or(raw, default)?;
    NonZeroUsize::new(size)
        .ok_or_else(|| SyncError::Common(cabsync_common::CommonError::InvalidBatchSize(size)))
}
