//! Request handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use hivegate_core::error::Error;
use hivegate_core::records::CommandRecord;
use hivegate_core::storage::JsonMap;

use crate::ServerState;

/// Health check.
pub async fn health_handler(State(state): State<ServerState>) -> Json<Value> {
    let uptime = chrono::Utc::now().timestamp() - state.started_at;
    Json(json!({
        "status": "ok",
        "service": "hivegate",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": uptime.max(0),
    }))
}

/// Feed one raw event into the ingestion pipeline.
pub async fn ingest_handler(
    State(state): State<ServerState>,
    Json(event): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let cancel = CancellationToken::new();
    match state.service.handle_event(event, cancel).await {
        Ok(report) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "accepted",
                "device_id": report.device_id,
                "category": report.category,
                "persisted": report.persisted,
                "skipped": report.skipped,
            })),
        ),
        Err(err) => error_response(&err),
    }
}

fn default_limit() -> usize {
    50
}

/// Query parameters for the alerts index read.
#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub severity: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Alerts with a given severity, newest first.
pub async fn alerts_by_severity_handler(
    State(state): State<ServerState>,
    Query(query): Query<AlertsQuery>,
) -> (StatusCode, Json<Value>) {
    if query.severity.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "severity must not be empty"})),
        );
    }

    match state
        .alerts
        .query_by_severity(&query.severity, query.limit)
        .await
    {
        Ok(alerts) => (StatusCode::OK, Json(json!({ "alerts": alerts }))),
        Err(err) => {
            error!(error = %err, "failed to query alerts");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": err.to_string()})),
            )
        }
    }
}

/// Reconciled state of one device, connectivity derived at read time.
pub async fn device_state_handler(
    State(state): State<ServerState>,
    Path(device_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.reconciler.get(&device_id).await {
        Ok(Some(device_state)) => match serde_json::to_value(&device_state) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(err) => {
                error!(error = %err, "failed to encode device state");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal server error"})),
                )
            }
        },
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "device has never reported"})),
        ),
        Err(err) => {
            error!(device_id = %device_id, error = %err, "failed to read device state");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": err.to_string()})),
            )
        }
    }
}

/// Body of a command write.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub device_id: String,
    pub action: String,
    #[serde(default)]
    pub parameters: JsonMap,
    /// Client-supplied id for idempotent retries; generated when absent.
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Record a command for a device.
pub async fn create_command_handler(
    State(state): State<ServerState>,
    Json(request): Json<CommandRequest>,
) -> (StatusCode, Json<Value>) {
    if request.device_id.is_empty() || request.action.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "device_id and action are required"})),
        );
    }

    let request_id = request
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let command = CommandRecord {
        request_id: request_id.clone(),
        device_id: request.device_id,
        timestamp: 0,
        action: request.action,
        parameters: request.parameters,
        expires_at: 0,
    };

    match state.commands.save(command).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({"request_id": request_id})),
        ),
        Err(err) => {
            error!(error = %err, "failed to save command");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": err.to_string()})),
            )
        }
    }
}

/// Map the ingestion error taxonomy onto HTTP statuses: client faults are
/// 400s, storage failures 502, everything unexpected 500.
fn error_response(err: &Error) -> (StatusCode, Json<Value>) {
    let status = if err.is_client_fault() {
        StatusCode::BAD_REQUEST
    } else if matches!(err, Error::Storage(_)) {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({"error": err.to_string()})))
}
