//! Hivegate server binary.
//!
//! Wires configuration, storage, the rule table, and the ingestion
//! service together, then serves the HTTP surface. Configuration comes
//! from the environment; a missing table name is fatal before anything
//! binds.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use hivegate_api::{run, ServerState};
use hivegate_core::config::{env_vars, IngestConfig};
use hivegate_core::storage::TableBackend;
use hivegate_devices::{RuleTable, StateReconciler};
use hivegate_ingest::{IngestionService, MessageValidator};
use hivegate_storage::{AlertStore, CommandStore, MemoryBackend, RedbBackend, TelemetryStore};

/// Hivegate - device message ingestion and state reconciliation.
#[derive(Parser, Debug)]
#[command(name = "hivegate")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the ingestion server.
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to.
        #[arg(short, long, default_value_t = 8086)]
        port: u16,
        /// Keep everything in memory; useful for local exercise.
        #[arg(long)]
        memory: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Serve { host, port, memory } => serve(host, port, memory).await,
    }
}

async fn serve(host: String, port: u16, memory: bool) -> Result<()> {
    info!("hivegate: cold start");

    let config = IngestConfig::from_env().context("loading ingestion configuration")?;

    let backend: Arc<dyn TableBackend> = if memory {
        info!("using in-memory storage backend");
        Arc::new(MemoryBackend::new())
    } else {
        let path = std::env::var(env_vars::DATA_PATH)
            .with_context(|| format!("{} is not set", env_vars::DATA_PATH))?;
        info!(path = %path, "opening storage backend");
        Arc::new(RedbBackend::open(&path).context("opening storage backend")?)
    };

    let rules = Arc::new(RuleTable::with_builtin());
    info!(device_types = ?rules.device_types(), "rule table registered");

    let telemetry = TelemetryStore::new(backend.clone(), &config.telemetry_table);
    let alerts = AlertStore::new(backend.clone(), &config.alerts_table);
    let commands = CommandStore::new(backend.clone(), &config.commands_table);
    let reconciler = StateReconciler::new(backend, &config.device_state_table, rules.clone());

    let service = Arc::new(IngestionService::new(
        MessageValidator::new(rules.clone(), config.batch_validation),
        rules,
        telemetry,
        alerts.clone(),
        reconciler.clone(),
    ));

    let state = ServerState::new(service, alerts, commands, reconciler);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parsing bind address")?;

    run(addr, state).await.context("serving")?;
    Ok(())
}
