//! Cabinet key → record id lookup built from the system of record
//!
//! Rebuilt on every run. Rows missing either half are skipped without being
//! counted as errors. When a key repeats, the row seen last wins.

use std::collections::HashMap;

use cabsync_common::types::{CabinetKey, RecordId};
use tracing::{debug, info};

use crate::error::Result;
use crate::remote::{IndexRow, RecordStore};

/// In-memory index of the system-of-record table
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    entries: HashMap<CabinetKey, RecordId>,
    skipped_rows: usize,
    duplicate_keys: usize,
}

impl RemoteIndex {
    /// Build the index from raw rows in arrival order
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = IndexRow>,
    {
        let mut index = RemoteIndex::default();

        for row in rows {
            let key = row.cabinet_key.as_ref().and_then(CabinetKey::from_value);
            let (Some(key), Some(record_id)) = (key, row.record_id) else {
                index.skipped_rows += 1;
                continue;
            };

            if let Some(previous) = index.entries.insert(key, record_id) {
                index.duplicate_keys += 1;
                debug!(replaced = %previous, "Duplicate cabinet key, keeping last row");
            }
        }

        index
    }

    pub fn get(&self, key: &CabinetKey) -> Option<&RecordId> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &CabinetKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct indexed keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows dropped for a missing key or id
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Rows that overwrote an earlier row with the same key
    pub fn duplicate_keys(&self) -> usize {
        self.duplicate_keys
    }
}

/// Query the store and build the index
pub async fn build_remote_index(store: &dyn RecordStore) -> Result<RemoteIndex> {
    info!("Fetching cabinet records for lookup");

    let rows = store.query_index_rows().await?;
    let row_count = rows.len();
    let index = RemoteIndex::from_rows(rows);

    info!(
        rows = row_count,
        indexed = index.len(),
        skipped = index.skipped_rows(),
        duplicates = index.duplicate_keys(),
        "Cabinet records indexed"
    );

    Ok(index)
}
