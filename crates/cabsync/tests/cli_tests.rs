//! End-to-end tests for the cabsync binary
//!
//! The binary runs with a cleared environment inside a temporary directory,
//! so neither the developer's shell nor a stray `.env` leaks into the run.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn cabsync(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cabsync").unwrap();
    cmd.env_clear().current_dir(dir.path());
    cmd
}

async fn mount_services(server: &MockServer) {
    let service_url = format!("{}/services/Cabinets/FeatureServer", server.uri());

    Mock::given(method("POST"))
        .and(path("/portal/sharing/rest/generateToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/portal/sharing/rest/content/items/layer-item"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": service_url})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/Cabinets/FeatureServer/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "extent": {"spatialReference": {"wkid": 3857}}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/Cabinets/FeatureServer/0/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [
                {"attributes": {"CabinetID": "CAB-1"}, "geometry": {"x": -9040000.0, "y": 3320000.0}},
                {"attributes": {"CabinetID": "CAB-2"}, "geometry": {"x": -9041000.0, "y": 3321000.0}},
                {"attributes": {"CabinetID": "CAB-3"}, "geometry": null}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/geometry/project"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "geometries": [{"x": -81.2081, "y": 28.5432}, {"x": -81.2171, "y": 28.5511}]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/records/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"3": {"value": 101}, "6": {"value": "CAB-1"}},
                {"3": {"value": 102}, "6": {"value": "CAB-2"}}
            ],
            "metadata": {"totalRecords": 2, "numRecords": 2, "skip": 0}
        })))
        .mount(server)
        .await;
}

fn with_service_env<'a>(cmd: &'a mut Command, server: &MockServer) -> &'a mut Command {
    cmd.env("ARCGIS_PORTAL_URL", format!("{}/portal", server.uri()))
        .env("ARCGIS_GEOMETRY_URL", format!("{}/geometry", server.uri()))
        .env("ARCGIS_LAYER_ITEM_ID", "layer-item")
        .env("OMNI_GIS_USER", "svc")
        .env("OMNI_GIS_PASS", "secret")
        .env("QB_API_URL", format!("{}/v1", server.uri()))
        .env("QB_TOKEN", "token")
}

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    cabsync(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--env-file"));
}

#[test]
fn test_missing_configuration_reports_failure() {
    let dir = tempfile::tempdir().unwrap();

    let assert = cabsync(&dir).assert().code(1);
    let output = assert.get_output();
    let stdout = String::from_utf8_lossy(&output.stdout);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("PAD_RESULT|status=FAILURE|"));
    assert!(lines[0].ends_with("|errors=1"));

    let summary: serde_json::Value =
        serde_json::from_str(lines[1].strip_prefix("PAD_SUMMARY=").unwrap()).unwrap();
    assert_eq!(summary["status"], "WARN");
    assert_eq!(summary["failed_stage"], "INIT");
    assert_eq!(summary["errors"], 1);

    assert!(String::from_utf8_lossy(&output.stderr).contains("ARCGIS_PORTAL_URL"));
}

#[test]
fn test_invalid_log_level_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    cabsync(&dir)
        .env("LOG_LEVEL", "loud")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("PAD_RESULT|status=FAILURE|"))
        .stderr(predicate::str::contains(
            "Warning: ignoring logging environment overrides",
        ))
        .stderr(predicate::str::contains("loud"));
}

#[test]
fn test_missing_env_file_reports_failure() {
    let dir = tempfile::tempdir().unwrap();

    cabsync(&dir)
        .arg("--env-file")
        .arg("does-not-exist.env")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("PAD_RESULT|status=FAILURE|"))
        .stdout(predicate::str::contains("PAD_SUMMARY="));
}

#[test]
fn test_env_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join("sync.env");
    // Everything but the token, so the run fails on the token specifically
    std::fs::write(
        &env_file,
        "ARCGIS_PORTAL_URL=http://127.0.0.1:9/portal\nOMNI_GIS_USER=svc\nOMNI_GIS_PASS=secret\n",
    )
    .unwrap();

    cabsync(&dir)
        .arg("--env-file")
        .arg(&env_file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("QB_TOKEN"));
}

#[tokio::test]
async fn test_full_run_against_mock_services() {
    let server = MockServer::start().await;
    mount_services(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "metadata": {"updatedRecordIds": [101, 102], "totalNumberOfRecordsProcessed": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cabsync(&dir);
    with_service_env(&mut cmd, &server)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "PAD_RESULT|status=SUCCESS|usable=2|qb_indexed=2|updates=2|unmatched=0\
             |dropped_null_geometry=0|updates_applied=2|batches_failed=0|errors=0",
        ))
        .stdout(predicate::str::contains("PAD_SUMMARY={\"status\":\"OK\""));
}

#[tokio::test]
async fn test_dry_run_sends_no_writes() {
    let server = MockServer::start().await;
    mount_services(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/records"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cabsync(&dir);
    with_service_env(&mut cmd, &server)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("|updates=2|"))
        .stdout(predicate::str::contains("|updates_applied=0|"));
}
