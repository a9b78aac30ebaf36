//! Process diagnostics via `tracing`.
//!
//! Startup, shutdown and dropped-telemetry events are written to stderr as
//! JSON so they never interleave with the request log on stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::observability::logging::Severity;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: Severity) -> String {
    format!(
        "cloud_native_app={},tower_http=warn",
        level.filter_directive()
    )
}

/// Install the global `tracing` subscriber.
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing(level: Severity) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}
