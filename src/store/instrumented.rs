//! Store decorator that counts operations by outcome.

use async_trait::async_trait;
use std::sync::Arc;

use crate::observability::{AppMetrics, OperationStatus};
use crate::store::{StoreError, Task, TaskStore};

const FIND: &str = "find";
const INSERT: &str = "insert";

/// Wraps a store and records `mongodb_operations_total{operation,status}`:
/// one `pending` when an operation starts, then `success` or `error`.
pub struct InstrumentedStore {
    inner: Arc<dyn TaskStore>,
    metrics: AppMetrics,
}

impl InstrumentedStore {
    pub fn new(inner: Arc<dyn TaskStore>, metrics: AppMetrics) -> Self {
        Self { inner, metrics }
    }

    fn record(&self, operation: &'static str, status: OperationStatus) {
        if let Err(e) = self.metrics.record_store_operation(operation, status) {
            tracing::debug!(operation, error = %e, "Dropped store metric");
        }
    }

    fn finish<T>(&self, operation: &'static str, result: Result<T, StoreError>) -> Result<T, StoreError> {
        let status = match result {
            Ok(_) => OperationStatus::Success,
            Err(_) => OperationStatus::Error,
        };
        self.record(operation, status);
        result
    }
}

#[async_trait]
impl TaskStore for InstrumentedStore {
    async fn find_all(&self) -> Result<Vec<Task>, StoreError> {
        self.record(FIND, OperationStatus::Pending);
        let result = self.inner.find_all().await;
        self.finish(FIND, result)
    }

    async fn insert(&self, document: serde_json::Value) -> Result<Task, StoreError> {
        self.record(INSERT, OperationStatus::Pending);
        let result = self.inner.insert(document).await;
        self.finish(INSERT, result)
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}
