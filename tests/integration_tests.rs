//! Integration tests using a mock HTTP server
//!
//! Runs the built-in CJ catalog end to end: config → HTTP requests →
//! SCHEMA/RECORD/STATE lines → state file.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tap_cj::state::StateStore;
use tap_cj::{
    builtin_catalog, Catalog, FileStateStore, HttpClient, JsonLinesWriter, StreamStatus,
    SyncEngine, TapConfig, CJ_API_URL,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> TapConfig {
    TapConfig::from_value(json!({
        "auth_token": "cj-token",
        "start_date": "2024-01-01",
        "publisher_ids": ["p1", "p2"],
        "api_url": server.uri(),
        "max_attempts": 1,
    }))
    .unwrap()
}

fn engine(config: &TapConfig, catalog: Catalog, store: Arc<dyn StateStore>, today: NaiveDate) -> SyncEngine {
    let client = HttpClient::with_auth(config.http_config(CJ_API_URL), config.auth()).unwrap();
    SyncEngine::new(client, catalog, store)
        .unwrap()
        .with_config(config.sync_config().with_today(today))
        .with_tap_config(config.template_value().clone())
        .with_start_date(config.start_date().unwrap())
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn commissions(records: &[(&str, &str)]) -> ResponseTemplate {
    let records: Vec<Value> = records
        .iter()
        .map(|(id, posted)| {
            json!({
                "commissionId": id,
                "postingDate": posted,
                "pubCommissionAmountUsd": "1.25",
                "advertiserName": "Acme",
            })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {"publisherCommissions": {"count": records.len(), "payloadComplete": true, "records": records}}
    }))
}

fn lines(sink: JsonLinesWriter<Vec<u8>>) -> Vec<Value> {
    String::from_utf8(sink.into_inner())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn record_ids(lines: &[Value]) -> Vec<String> {
    lines
        .iter()
        .filter(|l| l["type"] == "RECORD")
        .map(|l| l["record"]["commissionId"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// Built-in catalog
// ============================================================================

#[tokio::test]
async fn test_commissions_sync_per_publisher() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("Authorization", "Bearer cj-token"))
        .and(body_string_contains("p1"))
        .respond_with(commissions(&[
            ("c1", "2024-01-03T10:00:00Z"),
            ("c2", "2024-01-05T09:30:00Z"),
        ]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_string_contains("p2"))
        .respond_with(commissions(&[("c3", "2024-01-04T00:00:00Z")]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path().join("state.json"));
    let config = config(&server);
    let engine = engine(&config, builtin_catalog().unwrap(), Arc::new(store.clone()), day(2024, 1, 20));

    let mut sink = JsonLinesWriter::new(Vec::new());
    let report = engine.run(&mut sink).await.unwrap();
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.stream("commissions").unwrap().records, 3);

    let lines = lines(sink);
    assert_eq!(lines[0]["type"], "SCHEMA");
    assert_eq!(lines[0]["key_properties"], json!(["commissionId"]));
    assert_eq!(lines[0]["bookmark_properties"], json!(["postingDate"]));
    assert_eq!(record_ids(&lines), vec!["c1", "c2", "c3"]);
    // amounts are coerced to numbers
    assert_eq!(lines[1]["record"]["pubCommissionAmountUsd"], json!(1.25));
    assert_eq!(lines.last().unwrap()["type"], "STATE");

    let state = store.load().await.unwrap();
    assert_eq!(
        state.bookmark("commissions", Some("p1")).high_water_mark().as_deref(),
        Some("2024-01-05T09:30:00Z")
    );
    assert_eq!(
        state.bookmark("commissions", Some("p2")).high_water_mark().as_deref(),
        Some("2024-01-04T00:00:00Z")
    );
    assert!(state.last_completed_at.is_some());
}

#[tokio::test]
async fn test_second_run_starts_from_high_water_mark() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    std::fs::write(
        &state_path,
        json!({
            "bookmarks": {
                "commissions": {
                    "partitions": {
                        "p1": {"replication_key": "postingDate", "replication_key_value": "2024-01-15T12:00:00Z"},
                        "p2": {"replication_key": "postingDate", "replication_key_value": "2024-01-15T12:00:00Z"}
                    }
                }
            }
        })
        .to_string(),
    )
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_string_contains("2024-01-15T00:00:00Z"))
        .and(body_string_contains("p1"))
        .respond_with(commissions(&[
            ("old", "2024-01-15T12:00:00Z"),
            ("new", "2024-01-16T08:00:00Z"),
        ]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_string_contains("2024-01-15T00:00:00Z"))
        .respond_with(commissions(&[]))
        .expect(1)
        .mount(&server)
        .await;

    let store = FileStateStore::new(&state_path);
    let config = config(&server);
    let engine = engine(&config, builtin_catalog().unwrap(), Arc::new(store.clone()), day(2024, 2, 1));

    let mut sink = JsonLinesWriter::new(Vec::new());
    let report = engine.run(&mut sink).await.unwrap();
    let commissions = report.stream("commissions").unwrap();
    assert_eq!(commissions.status, StreamStatus::Completed);
    assert_eq!(commissions.filtered, 1);
    assert_eq!(record_ids(&lines(sink)), vec!["new"]);

    let state = store.load().await.unwrap();
    assert_eq!(
        state.bookmark("commissions", Some("p1")).high_water_mark().as_deref(),
        Some("2024-01-16T08:00:00Z")
    );
    // nothing new for p2, its mark stays
    assert_eq!(
        state.bookmark("commissions", Some("p2")).high_water_mark().as_deref(),
        Some("2024-01-15T12:00:00Z")
    );
}

#[tokio::test]
async fn test_graphql_errors_fail_the_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Not authorized for publisher p1"}]
        })))
        .mount(&server)
        .await;

    let config = config(&server);
    let engine = engine(
        &config,
        builtin_catalog().unwrap(),
        Arc::new(tap_cj::MemoryStateStore::new()),
        day(2024, 1, 20),
    );
    let mut sink = JsonLinesWriter::new(Vec::new());
    let report = engine.run(&mut sink).await.unwrap();

    let commissions = report.stream("commissions").unwrap();
    assert_eq!(commissions.status, StreamStatus::Failed);
    assert!(commissions
        .error
        .as_deref()
        .unwrap()
        .contains("Not authorized"));
    assert_eq!(report.exit_code(), 1);
    assert!(record_ids(&lines(sink)).is_empty());
}

// ============================================================================
// Catalog files
// ============================================================================

#[tokio::test]
async fn test_catalog_file_adds_a_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/advertisers"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "advertisers": [{"id": "a1"}, {"id": "a2"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/advertisers"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "advertisers": [{"id": "a3"}]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.yaml");
    std::fs::write(
        &catalog_path,
        r"
streams:
  - name: commissions
    selected: false
  - name: advertisers
    path: /advertisers
    records_path: advertisers
    primary_key: [id]
    pagination: { type: offset, limit: 2 }
    schema:
      type: object
      properties:
        id: { type: string }
",
    )
    .unwrap();

    let catalog = builtin_catalog()
        .unwrap()
        .merge(Catalog::read_file(&catalog_path).unwrap())
        .unwrap();
    assert_eq!(catalog.names(), vec!["commissions", "advertisers"]);

    let store = FileStateStore::new(dir.path().join("state.json"));
    let config = config(&server);
    let engine = engine(&config, catalog, Arc::new(store.clone()), day(2024, 1, 20));
    let mut sink = JsonLinesWriter::new(Vec::new());
    let report = engine.run(&mut sink).await.unwrap();

    assert_eq!(report.exit_code(), 0);
    assert!(report.stream("commissions").is_none());
    assert_eq!(report.stream("advertisers").unwrap().records, 3);

    let state = store.load().await.unwrap();
    assert!(state.bookmark("advertisers", None).exhausted);
}
