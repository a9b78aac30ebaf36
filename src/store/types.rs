//! Task document types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::StoreError;

/// A stored task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new task.
/// Keys outside the schema are dropped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

impl NewTask {
    /// Check a raw JSON document against the task schema.
    pub fn from_document(document: serde_json::Value) -> Result<Self, StoreError> {
        let draft: NewTask = serde_json::from_value(document)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        if draft.title.trim().is_empty() {
            return Err(StoreError::Validation("title: Path `title` is required.".into()));
        }
        Ok(draft)
    }

    pub fn into_task(self) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            description: self.description,
            completed: self.completed,
            created_at: Utc::now(),
        }
    }
}
