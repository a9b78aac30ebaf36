//! cloud-native-app
//!
//! A small task service built to be run in a container and watched by a
//! Prometheus scraper and a log collector.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!   Client request   │  instrumentation middleware (start)          │
//!   ─────────────────┼─▶ timeout / body limit ─▶ router ─▶ handler ─┼─▶ task store
//!                    │                                              │
//!   Client response  │  instrumentation middleware (completion)     │
//!   ◀────────────────┼─ body stream ◀──────────────────────────────┼──
//!                    │        │                    │                │
//!                    │        ▼                    ▼                │
//!                    │  metrics registry     JSON logger (stdout)   │
//!                    │  (GET /metrics)                              │
//!                    └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use cloud_native_app::config::load_config;
use cloud_native_app::lifecycle::{signals, Shutdown};
use cloud_native_app::observability::diagnostics::init_tracing;
use cloud_native_app::observability::process::TrackingAllocator;
use cloud_native_app::observability::{Severity, Telemetry};
use cloud_native_app::store::{MemoryTaskStore, TaskStore};
use cloud_native_app::HttpServer;

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator;

#[derive(Parser)]
#[command(name = "cloud-native-app")]
#[command(about = "Instrumented task service", long_about = None)]
struct Args {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let level: Severity = config.logging.level.parse()?;

    init_tracing(level);
    tracing::info!(version = %config.logging.version, "cloud-native-app starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        environment = %config.logging.environment,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    let telemetry = Telemetry::new(config.logging.defaults(), level)?;
    let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_listener(shutdown);

    HttpServer::new(config, telemetry, store)
        .run(listener, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
