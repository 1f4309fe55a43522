//! Quickbase request and response types
//!
//! Rows travel as maps from field id to a `{"value": ...}` cell.

use cabsync_common::types::{FieldId, RecordId, UpdateRecord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::remote::{IndexRow, WriteAck};

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub from: String,
    pub select: Vec<FieldId>,
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueryOptions {
    pub skip: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    #[serde(default)]
    pub total_records: usize,
    #[serde(default)]
    pub num_records: usize,
}

/// One page of a record query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    #[serde(default)]
    pub metadata: Option<QueryMetadata>,
}

impl QueryResponse {
    /// Project raw rows onto (record id, cabinet key)
    pub fn index_rows(&self, record_id_field: FieldId, cabinet_field: FieldId) -> Vec<IndexRow> {
        let (rid_key, cab_key) = (record_id_field.key(), cabinet_field.key());
        self.data
            .iter()
            .map(|row| IndexRow {
                record_id: cell_value(row, &rid_key).and_then(RecordId::from_value),
                cabinet_key: cell_value(row, &cab_key),
            })
            .collect()
    }
}

fn cell_value(row: &Map<String, Value>, key: &str) -> Option<Value> {
    row.get(key)?.get("value").cloned()
}

/// Column layout for coordinate write-back
#[derive(Debug, Clone, Copy)]
pub struct UpdateColumns {
    pub record_id: FieldId,
    pub latitude: FieldId,
    pub longitude: FieldId,
}

impl UpdateColumns {
    pub fn row(&self, update: &UpdateRecord) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert(
            self.record_id.key(),
            json!({ "value": update.record_id.as_value() }),
        );
        row.insert(self.latitude.key(), json!({ "value": update.latitude }));
        row.insert(self.longitude.key(), json!({ "value": update.longitude }));
        row
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpsertRequest {
    pub to: String,
    pub data: Vec<Map<String, Value>>,
}

/// Read the acknowledgement out of an accepted upsert body.
///
/// Quickbase reports per-row problems under `metadata.lineErrors` as a map
/// of line number to messages.
pub fn write_ack(body: &Value) -> WriteAck {
    let metadata = body.get("metadata");
    let processed = metadata
        .and_then(|m| m.get("totalNumberOfRecordsProcessed"))
        .and_then(Value::as_u64);
    let line_errors = metadata
        .and_then(|m| m.get("lineErrors"))
        .and_then(Value::as_object)
        .map_or(0, Map::len);

    WriteAck {
        processed,
        line_errors,
    }
}
