//! Task persistence subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → instrumented.rs (operation counters: pending → success | error)
//!     → TaskStore implementation (memory.rs)
//! ```
//!
//! # Design Decisions
//! - Handlers only see `Arc<dyn TaskStore>`; the backend is swappable
//! - The store validates documents, so a bad body surfaces as a store error
//! - Operation names are a fixed set to keep metric cardinality bounded

pub mod instrumented;
pub mod memory;
pub mod types;

use async_trait::async_trait;

pub use instrumented::InstrumentedStore;
pub use memory::MemoryTaskStore;
pub use types::{NewTask, Task};

/// Errors returned by task store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task validation failed: {0}")]
    Validation(String),

    #[error("task store is closed")]
    Closed,

    #[error("task store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations used by the HTTP layer.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks, newest first.
    async fn find_all(&self) -> Result<Vec<Task>, StoreError>;

    /// Validate `document` and store it as a new task.
    async fn insert(&self, document: serde_json::Value) -> Result<Task, StoreError>;

    /// Release connections; later operations fail with `StoreError::Closed`.
    async fn close(&self);
}
