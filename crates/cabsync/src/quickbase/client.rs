//! HTTP client for the Quickbase JSON API

use async_trait::async_trait;
use cabsync_common::types::UpdateRecord;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::QuickbaseConfig;
use crate::error::{Result, SyncError};
use crate::quickbase::{endpoints, types::*};
use crate::remote::{IndexRow, RecordStore, WriteAck};

/// Realm header required on every request
pub const REALM_HEADER: &str = "qb-realm-hostname";

/// Table access scoped to one realm and user token
pub struct QuickbaseClient {
    client: Client,
    config: QuickbaseConfig,
}

impl QuickbaseClient {
    pub fn new(config: QuickbaseConfig, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REALM_HEADER,
            HeaderValue::from_str(&config.realm)
                .map_err(|_| SyncError::config("QB_REALM is not a valid header value"))?,
        );
        let mut auth = HeaderValue::from_str(&format!("QB-USER-TOKEN {}", config.user_token))
            .map_err(|_| SyncError::config("QB_TOKEN is not a valid header value"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("cabsync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn columns(&self) -> UpdateColumns {
        UpdateColumns {
            record_id: self.config.record_id_field,
            latitude: self.config.latitude_field,
            longitude: self.config.longitude_field,
        }
    }

    async fn query_page(&self, skip: usize) -> Result<QueryResponse> {
        let url = endpoints::records_query_url(&self.config.api_url);
        let request = QueryRequest {
            from: self.config.table_id.clone(),
            select: vec![self.config.record_id_field, self.config.cabinet_id_field],
            options: QueryOptions { skip },
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                warn!(status = status.as_u16(), error = %e, "Failed to read error response body");
                String::new()
            });
            return Err(SyncError::Quickbase {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RecordStore for QuickbaseClient {
    async fn query_index_rows(&self) -> Result<Vec<IndexRow>> {
        let mut rows = Vec::new();
        let mut skip = 0;

        loop {
            let page = self.query_page(skip).await?;
            rows.extend(
                page.index_rows(self.config.record_id_field, self.config.cabinet_id_field),
            );

            let Some(metadata) = page.metadata else {
                break;
            };
            let returned = if metadata.num_records > 0 {
                metadata.num_records
            } else {
                page.data.len()
            };
            skip += returned;
            debug!(page = returned, skip, total = metadata.total_records, "Fetched record page");

            if returned == 0 || skip >= metadata.total_records {
                break;
            }
        }

        Ok(rows)
    }

    async fn write_batch(&self, batch: &[UpdateRecord]) -> Result<WriteAck> {
        let url = endpoints::records_url(&self.config.api_url);
        let columns = self.columns();
        let request = UpsertRequest {
            to: self.config.table_id.clone(),
            data: batch.iter().map(|u| columns.row(u)).collect(),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_else(|e| {
            warn!(status = status.as_u16(), error = %e, "Failed to read write response body");
            String::new()
        });

        if status.as_u16() >= 300 {
            return Err(SyncError::Quickbase {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: Value = serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!(
                status = status.as_u16(),
                records = batch.len(),
                error = %e,
                "Write response is not JSON, line errors unknown"
            );
            Value::Null
        });
        Ok(write_ack(&parsed))
    }
}
