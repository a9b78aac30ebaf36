//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → middleware/instrumentation.rs (start measurement)
//!     → timeout + body limit layers
//!     → server.rs router → handlers.rs
//!         → store (Arc<dyn TaskStore>)
//!         → error.rs (StoreError → 5xx JSON)
//!     → response body streamed (measurement completes)
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{AppState, HttpServer};
