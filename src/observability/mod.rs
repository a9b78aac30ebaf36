//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! middleware (per request)
//!     → telemetry.rs (typed instruments)
//!         → metrics.rs (registry, exposition render)
//!     → process.rs (CPU and memory samples)
//!     → logging.rs (one JSON line per request)
//!
//! Consumers:
//!     → GET /metrics (Prometheus scrape)
//!     → stdout (log collector)
//!     → stderr (diagnostics.rs, process events)
//! ```
//!
//! # Design Decisions
//! - Registry and logger are built once and passed by handle
//! - Telemetry is best-effort: it never fails a request

pub mod diagnostics;
pub mod logging;
pub mod metrics;
pub mod process;
pub mod telemetry;

pub use logging::{LogDefaults, Logger, MemorySink, Severity};
pub use metrics::{MetricsError, MetricsRegistry};
pub use telemetry::{AppMetrics, OperationStatus, Outcome, RequestLabels, Telemetry};
