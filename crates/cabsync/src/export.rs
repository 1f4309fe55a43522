//! Unmatched cabinet export
//!
//! Writes the keys the system of record does not know about to a CSV file so
//! someone can fix them by hand. The run timestamp is appended to the file
//! stem, so earlier exports are never overwritten.

use std::path::{Path, PathBuf};

use cabsync_common::types::CabinetKey;
use chrono::{DateTime, Local};
use tracing::info;

use crate::error::Result;

/// Column header of the export
pub const EXPORT_HEADER: &str = "CabinetID";

/// `<dir>/<stem>_<YYYYmmdd_HHMMSS><ext>`, defaulting the extension to `.csv`
pub fn timestamped_path(template: &Path, at: DateTime<Local>) -> PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unmatched_cabinets".to_string());
    let ext = template
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());

    let file_name = format!("{}_{}.{}", stem, at.format("%Y%m%d_%H%M%S"), ext);
    template.with_file_name(file_name)
}

/// Write `keys` under a header row, one per line.
///
/// Returns the written path, or `None` when there was nothing to export.
pub fn export_unmatched(
    template: &Path,
    keys: &[CabinetKey],
    at: DateTime<Local>,
) -> Result<Option<PathBuf>> {
    if keys.is_empty() {
        info!("No unmatched cabinets to export");
        return Ok(None);
    }

    let path = timestamped_path(template, at);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([EXPORT_HEADER])?;
    for key in keys {
        writer.write_record([key.as_str()])?;
    }
    writer.flush()?;

    info!(path = %path.display(), count = keys.len(), "Unmatched cabinet ids exported");
    Ok(Some(path))
}
