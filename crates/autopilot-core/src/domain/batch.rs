//! Batch: a named group of tasks from one import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::BatchId;
use super::task::{BatchRef, Task};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl Batch {
    pub fn new(id: BatchId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at,
            tasks: Vec::new(),
        }
    }

    pub fn reference(&self) -> BatchRef {
        BatchRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            task_count: self.tasks.len(),
        }
    }
}

/// Batch without its tasks, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub id: BatchId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub task_count: usize,
}
