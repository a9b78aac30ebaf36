//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → server stops accepting → in-flight requests finish
//!     → task store closed → process exits
//! ```
//!
//! # Design Decisions
//! - In-flight measurements are self-contained; nothing needs draining
//! - One broadcast channel; any number of tasks may subscribe

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
