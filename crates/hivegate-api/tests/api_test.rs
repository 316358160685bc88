//! Router behavior: ingestion round-trips and error mapping.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use hivegate_core::config::BatchValidationPolicy;
use hivegate_devices::{RuleTable, StateReconciler};
use hivegate_ingest::{IngestionService, MessageValidator};
use hivegate_storage::{AlertStore, CommandStore, MemoryBackend, TelemetryStore};

use hivegate_api::{create_router, ServerState};

fn app() -> Router {
    let backend = Arc::new(MemoryBackend::new());
    let rules = Arc::new(RuleTable::with_builtin());

    let telemetry = TelemetryStore::new(backend.clone(), "telemetry");
    let alerts = AlertStore::new(backend.clone(), "alerts");
    let commands = CommandStore::new(backend.clone(), "commands");
    let reconciler = StateReconciler::new(backend, "device_state", rules.clone());

    let service = Arc::new(IngestionService::new(
        MessageValidator::new(rules.clone(), BatchValidationPolicy::Lenient),
        rules,
        telemetry,
        alerts.clone(),
        reconciler.clone(),
    ));

    create_router(ServerState::new(service, alerts, commands, reconciler))
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::test]
async fn health_reports_service_identity() {
    let app = app();
    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "hivegate");
}

#[tokio::test]
async fn ingest_accepts_telemetry_and_exposes_state() {
    let app = app();
    let ts = now();

    let (status, body) = request(
        &app,
        "POST",
        "/ingest",
        Some(json!({
            "topic": "devices/dev-1/telemetry",
            "payload": {
                "device_id": "dev-1",
                "timestamp": ts,
                "type": "temp-sensor",
                "payload": {"temp": 35},
            },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["persisted"], 1);

    let (status, body) = request(&app, "GET", "/devices/dev-1/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operational_state"], "HOT");
    assert_eq!(body["health"], "DEGRADED");
    assert_eq!(body["status"], "ONLINE");
}

#[tokio::test]
async fn ingest_maps_validation_errors_to_bad_request() {
    let app = app();

    let (status, body) = request(
        &app,
        "POST",
        "/ingest",
        Some(json!({
            "topic": "machines/dev-1/telemetry",
            "payload": {},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid topic"));
}

#[tokio::test]
async fn alerts_flow_through_to_the_severity_index() {
    let app = app();
    let ts = now();

    let (status, _) = request(
        &app,
        "POST",
        "/ingest",
        Some(json!({
            "topic": "devices/dev-2/alerts",
            "payload": {
                "device_id": "dev-2",
                "timestamp": ts,
                "type": "temp-sensor",
                "payload": {"temp": 45, "severity": "HIGH"},
            },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = request(&app, "GET", "/alerts?severity=HIGH", None).await;
    assert_eq!(status, StatusCode::OK);
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["device_id"], "dev-2");

    let (status, body) = request(&app, "GET", "/alerts?severity=LOW", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["alerts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_device_state_is_not_found() {
    let app = app();
    let (status, _) = request(&app, "GET", "/devices/ghost/state", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn commands_get_a_request_id() {
    let app = app();

    let (status, body) = request(
        &app,
        "POST",
        "/commands",
        Some(json!({
            "device_id": "dev-1",
            "action": "unlock",
            "parameters": {"door": "front"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!body["request_id"].as_str().unwrap().is_empty());

    let (status, _) = request(
        &app,
        "POST",
        "/commands",
        Some(json!({"device_id": "", "action": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
