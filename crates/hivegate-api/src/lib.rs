//! HTTP surface for Hivegate.
//!
//! `POST /ingest` feeds raw events into the ingestion pipeline the same
//! way the transport layer would; the read endpoints expose alerts by
//! severity and reconciled device state. Used for local exercise of the
//! pipeline and by the server binary.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tracing::info;

use hivegate_devices::StateReconciler;
use hivegate_ingest::IngestionService;
use hivegate_storage::{AlertStore, CommandStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    pub service: Arc<IngestionService>,
    pub alerts: AlertStore,
    pub commands: CommandStore,
    pub reconciler: StateReconciler,
    pub started_at: i64,
}

impl ServerState {
    pub fn new(
        service: Arc<IngestionService>,
        alerts: AlertStore,
        commands: CommandStore,
        reconciler: StateReconciler,
    ) -> Self {
        Self {
            service,
            alerts,
            commands,
            reconciler,
            started_at: Utc::now().timestamp(),
        }
    }
}

/// Build the router.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/ingest", post(handlers::ingest_handler))
        .route("/alerts", get(handlers::alerts_by_severity_handler))
        .route("/devices/:device_id/state", get(handlers::device_state_handler))
        .route("/commands", post(handlers::create_command_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the task is stopped.
pub async fn run(addr: SocketAddr, state: ServerState) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "hivegate api listening");
    axum::serve(listener, app).await
}
