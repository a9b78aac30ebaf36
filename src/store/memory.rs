//! In-process task store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use uuid::Uuid;

use crate::store::{NewTask, StoreError, Task, TaskStore};

/// Task store backed by a concurrent map.
///
/// Insertion order is tracked with a sequence number so listings are
/// stable even when two tasks share a timestamp.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: DashMap<Uuid, (u64, Task)>,
    sequence: AtomicU64,
    closed: AtomicBool,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn find_all(&self) -> Result<Vec<Task>, StoreError> {
        self.ensure_open()?;
        let mut entries: Vec<(u64, Task)> = self
            .tasks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, task)| task).collect())
    }

    async fn insert(&self, document: serde_json::Value) -> Result<Task, StoreError> {
        self.ensure_open()?;
        let task = NewTask::from_document(document)?.into_task();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.tasks.insert(task.id, (seq, task.clone()));
        Ok(task)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(tasks = self.tasks.len(), "Task store closed");
        }
    }
}
