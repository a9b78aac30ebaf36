//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (instrumentation, panic recovery, timeout, body limit)
//! - Wrap the task store with operation counters
//! - Serve until the shutdown signal, then close the store

use axum::{
    middleware,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
};

use crate::config::AppConfig;
use crate::http::error::panic_response;
use crate::http::handlers;
use crate::http::middleware::instrument_requests;
use crate::observability::Telemetry;
use crate::store::{InstrumentedStore, TaskStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub telemetry: Telemetry,
    pub config: Arc<AppConfig>,
}

/// HTTP server for the task service.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server. `store` is wrapped so every operation is
    /// counted in the registry owned by `telemetry`.
    pub fn new(config: AppConfig, telemetry: Telemetry, store: Arc<dyn TaskStore>) -> Self {
        let store: Arc<dyn TaskStore> =
            Arc::new(InstrumentedStore::new(store, telemetry.metrics.clone()));

        let state = AppState {
            store,
            telemetry,
            config: Arc::new(config),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Instrumentation is the outermost layer so timeouts, body-limit
    /// rejections, 404s and recovered panics are measured like any other
    /// response.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let server = &state.config.server;
        let timeout = Duration::from_secs(server.request_timeout_secs);
        let body_limit = server.max_body_bytes;
        let telemetry = state.telemetry.clone();

        Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .route("/api/tasks", get(handlers::list_tasks).post(handlers::create_task))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(TimeoutLayer::new(timeout))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn_with_state(telemetry, instrument_requests))
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.state.config.logging.environment,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        self.state.store.close().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.state.config
    }
}
