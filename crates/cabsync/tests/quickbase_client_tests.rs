//! Quickbase client tests against a mock JSON API

use std::time::Duration;

use cabsync::config::QuickbaseConfig;
use cabsync::quickbase::QuickbaseClient;
use cabsync::remote::RecordStore;
use cabsync::SyncError;
use cabsync_common::types::{FieldId, RecordId, UpdateRecord};
use serde_json::json;
use wiremock::{
    matchers::{body_json, body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn client(server: &MockServer) -> QuickbaseClient {
    let config = QuickbaseConfig {
        api_url: format!("{}/v1", server.uri()),
        realm: "example.quickbase.com".to_string(),
        user_token: "b12345_token".to_string(),
        table_id: "bts8av3cw".to_string(),
        record_id_field: FieldId(3),
        cabinet_id_field: FieldId(6),
        latitude_field: FieldId(9),
        longitude_field: FieldId(10),
    };
    QuickbaseClient::new(config, Duration::from_secs(5)).unwrap()
}

fn update(id: i64, lat: f64, lon: f64) -> UpdateRecord {
    UpdateRecord::rounded(RecordId::from_value(json!(id)).unwrap(), lat, lon)
}

// ============================================================================
// Index query
// ============================================================================

#[tokio::test]
async fn test_query_sends_auth_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/records/query"))
        .and(header("QB-Realm-Hostname", "example.quickbase.com"))
        .and(header("Authorization", "QB-USER-TOKEN b12345_token"))
        .and(body_json(json!({
            "from": "bts8av3cw",
            "select": [3, 6],
            "options": {"skip": 0}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"3": {"value": 1}, "6": {"value": "CAB-1"}},
                {"3": {"value": 2}, "6": {"value": " "}}
            ],
            "fields": [{"id": 3, "label": "Record ID#", "type": "recordid"}],
            "metadata": {"totalRecords": 2, "numRecords": 2, "numFields": 2, "skip": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rows = client(&server).query_index_rows().await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].record_id, RecordId::from_value(json!(1)));
    assert_eq!(rows[0].cabinet_key, Some(json!("CAB-1")));
}

#[tokio::test]
async fn test_query_follows_pages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/records/query"))
        .and(body_partial_json(json!({"options": {"skip": 0}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"3": {"value": 1}, "6": {"value": "A"}},
                {"3": {"value": 2}, "6": {"value": "B"}}
            ],
            "metadata": {"totalRecords": 3, "numRecords": 2, "skip": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/records/query"))
        .and(body_partial_json(json!({"options": {"skip": 2}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"3": {"value": 3}, "6": {"value": "C"}}],
            "metadata": {"totalRecords": 3, "numRecords": 1, "skip": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rows = client(&server).query_index_rows().await.unwrap();
    let keys: Vec<_> = rows.iter().filter_map(|r| r.cabinet_key.clone()).collect();
    assert_eq!(keys, vec![json!("A"), json!("B"), json!("C")]);
}

#[tokio::test]
async fn test_query_failure_is_fatal_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/records/query"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "Unauthorized", "description": "Invalid token"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).query_index_rows().await.unwrap_err();
    match err {
        SyncError::Quickbase { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid token"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Write-back
// ============================================================================

#[tokio::test]
async fn test_write_batch_payload_and_ack() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/records"))
        .and(body_json(json!({
            "to": "bts8av3cw",
            "data": [
                {"3": {"value": 7}, "9": {"value": 28.543210}, "10": {"value": -81.208100}},
                {"3": {"value": 8}, "9": {"value": 28.5}, "10": {"value": -81.5}}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "metadata": {
                "createdRecordIds": [],
                "updatedRecordIds": [7, 8],
                "unchangedRecordIds": [],
                "totalNumberOfRecordsProcessed": 2
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client(&server)
        .write_batch(&[
            update(7, 28.5432104, -81.2081),
            update(8, 28.5, -81.5),
        ])
        .await
        .unwrap();

    assert_eq!(ack.processed, Some(2));
    assert_eq!(ack.line_errors, 0);
}

#[tokio::test]
async fn test_write_batch_line_errors_are_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/records"))
        .respond_with(ResponseTemplate::new(207).set_body_json(json!({
            "data": [],
            "metadata": {
                "lineErrors": {"1": ["Incompatible value for field with ID \"9\"."]},
                "totalNumberOfRecordsProcessed": 1
            }
        })))
        .mount(&server)
        .await;

    let ack = client(&server)
        .write_batch(&[update(1, 1.0, 1.0)])
        .await
        .unwrap();
    assert_eq!(ack.line_errors, 1);
}

#[tokio::test]
async fn test_write_batch_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/records"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request"))
        .mount(&server)
        .await;

    let err = client(&server)
        .write_batch(&[update(1, 1.0, 1.0)])
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Quickbase { status: 400, .. }));
}

#[tokio::test]
async fn test_write_batch_non_json_ack_is_accepted_without_counts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/records"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>upstream proxy</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client(&server)
        .write_batch(&[update(1, 1.0, 1.0), update(2, 2.0, 2.0)])
        .await
        .unwrap();

    assert_eq!(ack.processed, None);
    assert_eq!(ack.line_errors, 0);
}
