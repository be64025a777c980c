//! HTTP API integration tests
//!
//! Drive the full router with `tower::ServiceExt::oneshot` over in-memory
//! stores, covering listing, pagination, lookups, analytics, the manual
//! pipeline trigger, and the shared-secret and CORS layers.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use snapflow_common::types::{CuratedRecord, RecordPayload};
use snapflow_server::api::{create_router, ApiState};
use snapflow_server::config::{CorsConfig, IngestConfig};
use snapflow_server::ingest::Ingestor;
use snapflow_server::orchestrator::PipelineRunner;
use snapflow_server::stores::memory::{MemoryCuratedStore, MemoryQueue, MemoryRawStore};
use snapflow_server::stores::CuratedStore;
use snapflow_server::transform::Transformer;
use tower::ServiceExt;

fn record(id: &str, source: &str, day: u32) -> CuratedRecord {
    let captured_at = Utc.with_ymd_and_hms(2026, 8, day, 12, 0, 0).unwrap();
    CuratedRecord {
        id: id.to_string(),
        source: source.to_string(),
        captured_at,
        processed_at: captured_at,
        fingerprint: "f".to_string(),
        raw_key: format!("raw/source={source}/date=2026-08-{day:02}/x.json"),
        payload: RecordPayload::Post {
            title: "title".to_string(),
            body: "body".to_string(),
            user_id: "1".to_string(),
        },
    }
}

async fn build_app(records: Vec<CuratedRecord>, api_key: Option<&str>) -> Router {
    let raw = Arc::new(MemoryRawStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let curated = Arc::new(MemoryCuratedStore::new());
    for r in &records {
        curated.put_if_absent(r).await.unwrap();
    }

    // A runner with no configured sources; enough for the trigger route.
    let config = IngestConfig::default();
    let ingestor = Ingestor::new(&config, vec![], raw.clone(), queue.clone()).unwrap();
    let transformer = Transformer::new(raw, curated.clone());
    let runner = Arc::new(PipelineRunner::new(ingestor, transformer, queue, config.batch_size));

    let state = ApiState {
        curated,
        runner,
        api_key: api_key.map(str::to_string),
    };
    let cors = CorsConfig {
        allowed_origins: vec!["http://localhost:3000".to_string()],
        allow_credentials: true,
    };
    create_router(state, &cors)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_list_records_filters_by_source() {
    let mut records = Vec::new();
    for i in 0..8 {
        records.push(record(&format!("jsonplaceholder-{i}-x"), "jsonplaceholder", 1));
    }
    records.push(record("randomuser-a-x", "randomuser", 1));
    records.push(record("randomuser-b-x", "randomuser", 1));
    let app = build_app(records, None).await;

    let (status, body) = get_json(&app, "/records?source=randomuser").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let listed = body["records"].as_array().unwrap();
    assert!(listed.iter().all(|r| r["source"] == "randomuser"));
    assert!(body["cursor"].is_null());
}

#[tokio::test]
async fn test_cursor_walk_covers_every_record_once() {
    let records: Vec<CuratedRecord> =
        (0..7).map(|i| record(&format!("jsonplaceholder-{i}-x"), "jsonplaceholder", 1)).collect();
    let app = build_app(records, None).await;

    let mut seen = Vec::new();
    let mut uri = "/records?limit=3".to_string();
    loop {
        let (status, body) = get_json(&app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        for r in body["records"].as_array().unwrap() {
            seen.push(r["id"].as_str().unwrap().to_string());
        }
        match body.get("cursor").and_then(Value::as_str) {
            Some(cursor) => uri = format!("/records?limit=3&cursor={cursor}"),
            None => break,
        }
    }

    let (_, full) = get_json(&app, "/records?limit=100").await;
    let all: Vec<String> = full["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(seen, all);
    assert_eq!(seen.len(), 7);
}

#[tokio::test]
async fn test_malformed_cursor_is_rejected() {
    let app = build_app(vec![record("jsonplaceholder-1-x", "jsonplaceholder", 1)], None).await;

    let (status, body) = get_json(&app, "/records?cursor=%21%21not-base64%21%21").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid cursor");
}

#[tokio::test]
async fn test_get_record_by_id() {
    let app = build_app(vec![record("jsonplaceholder-1-x", "jsonplaceholder", 1)], None).await;

    let (status, body) = get_json(&app, "/records/jsonplaceholder-1-x").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "jsonplaceholder-1-x");
    assert_eq!(body["title"], "title");

    let (status, body) = get_json(&app, "/records/no-such-id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Record not found");
    assert_eq!(body["id"], "no-such-id");
}

#[tokio::test]
async fn test_unknown_route_returns_shaped_404() {
    let app = build_app(vec![], None).await;

    let (status, body) = get_json(&app, "/nope/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
    assert_eq!(body["path"], "/nope/nothing");
}

#[tokio::test]
async fn test_analytics_aggregates_and_limits_timeline() {
    // Nine distinct capture dates; only the seven most recent survive.
    let mut records = Vec::new();
    for day in 1..=9 {
        records.push(record(&format!("jsonplaceholder-{day}-x"), "jsonplaceholder", day));
    }
    records.push(record("randomuser-a-x", "randomuser", 9));
    let app = build_app(records, None).await;

    let (status, body) = get_json(&app, "/analytics").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["summary"]["total_records"], 10);
    assert_eq!(body["summary"]["total_sources"], 2);
    assert_eq!(body["by_source"]["jsonplaceholder"], 9);
    assert_eq!(body["by_source"]["randomuser"], 1);
    assert_eq!(
        body["summary"]["oldest_record"].as_str().unwrap().split('T').next().unwrap(),
        "2026-08-01"
    );

    let timeline = body["timeline"].as_array().unwrap();
    assert_eq!(timeline.len(), 7);
    let dates: Vec<&str> = timeline.iter().map(|e| e["date"].as_str().unwrap()).collect();
    assert_eq!(dates.first(), Some(&"2026-08-03"));
    assert_eq!(dates.last(), Some(&"2026-08-09"));
    let mut sorted = dates.clone();
    sorted.sort_unstable();
    assert_eq!(dates, sorted);
    assert_eq!(timeline[6]["count"], 2);
}

#[tokio::test]
async fn test_analytics_on_empty_store() {
    let app = build_app(vec![], None).await;

    let (status, body) = get_json(&app, "/analytics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_records"], 0);
    assert!(body["summary"]["oldest_record"].is_null());
    assert!(body["timeline"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_trigger_runs_a_cycle() {
    let app = build_app(vec![], None).await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/ingest/run")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["messages_processed"], 0);
    assert!(body["ingest"]["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_api_key_guards_all_routes_except_health() {
    let app = build_app(vec![], Some("sekrit")).await;

    // Missing key.
    let (status, body) = get_json(&app, "/records").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    // Wrong key.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/records")
                .header("x-api-key", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Right key.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/records")
                .header("x-api-key", "sekrit")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Health stays open.
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let app = build_app(vec![], None).await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/records")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-api-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
}
