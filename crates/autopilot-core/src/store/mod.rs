//! In-memory task store.
//!
//! Design:
//! - Single source of truth for batches and tasks (memory resident, reset on restart).
//! - One `tokio::sync::Mutex` guards all state; every operation takes it once,
//!   so readers never observe a half-updated task.
//! - Constructed once and shared via `Arc` with the orchestrator and the service layer.

mod query;

pub use query::{TaskPage, TaskQuery};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::{Batch, BatchId, BatchRef, BatchSummary, Task, TaskId, TaskRow, TaskStatus};
use crate::error::PipelineError;
use crate::observability::StatusCounts;
use crate::ports::{Clock, IdGenerator};

/// Result of ingesting one import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub batch_id: BatchId,
    pub task_ids: Vec<TaskId>,
}

/// Position of a task: (batch index, task index). Batches and tasks are never
/// removed (only `reset` clears everything), so positions stay valid.
type Slot = (usize, usize);

#[derive(Default)]
struct StoreState {
    batches: Vec<Batch>,
    task_index: HashMap<TaskId, Slot>,
}

impl StoreState {
    fn slot(&self, task_id: &TaskId) -> Result<Slot, PipelineError> {
        self.task_index
            .get(task_id)
            .copied()
            .ok_or_else(|| PipelineError::task_not_found(task_id))
    }

    fn batch_position(&self, batch_id: &BatchId) -> Result<usize, PipelineError> {
        self.batches
            .iter()
            .position(|batch| &batch.id == batch_id)
            .ok_or_else(|| PipelineError::batch_not_found(batch_id))
    }

    fn task(&self, (batch, task): Slot) -> &Task {
        &self.batches[batch].tasks[task]
    }

    fn store(&mut self, (batch, task): Slot, updated: Task) {
        self.batches[batch].tasks[task] = updated;
    }

    fn tasks_in<'a>(&'a self, batch_id: Option<&'a BatchId>) -> impl Iterator<Item = &'a Task> + 'a {
        self.batches
            .iter()
            .filter(move |batch| batch_id.is_none_or(|id| &batch.id == id))
            .flat_map(|batch| batch.tasks.iter())
    }
}

pub struct TaskStore {
    state: Mutex<StoreState>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            ids,
            clock,
        }
    }

    /// Create a batch from imported rows.
    pub async fn create_batch(
        &self,
        name: impl Into<String>,
        rows: Vec<TaskRow>,
    ) -> Result<BatchId, PipelineError> {
        Ok(self.ingest_rows(name, rows).await?.batch_id)
    }

    /// Create a batch and report the ids assigned to its tasks.
    ///
    /// # Errors
    /// `BadRequest` for an empty import or a row without a legal entity id.
    pub async fn ingest_rows(
        &self,
        name: impl Into<String>,
        rows: Vec<TaskRow>,
    ) -> Result<IngestReceipt, PipelineError> {
        if rows.is_empty() {
            return Err(PipelineError::bad_request("import contains no rows"));
        }
        if let Some(line) = rows.iter().position(|row| row.le_id.trim().is_empty()) {
            return Err(PipelineError::bad_request(format!(
                "row {} has no legal entity id",
                line + 1
            )));
        }

        let now = self.clock.now();
        let mut batch = Batch::new(self.ids.generate_batch_id(), name, now);
        let reference = batch.reference();
        for row in rows {
            let task = Task::new(self.ids.generate_task_id(), row, reference.clone(), now);
            batch.tasks.push(task);
        }

        let mut state = self.state.lock().await;
        if let Some(duplicate) = batch
            .tasks
            .iter()
            .find(|task| state.task_index.contains_key(&task.id))
        {
            return Err(PipelineError::internal(format!(
                "id generator produced duplicate task id {}",
                duplicate.id
            )));
        }

        let batch_position = state.batches.len();
        let task_ids: Vec<TaskId> = batch.tasks.iter().map(|task| task.id.clone()).collect();
        for (position, id) in task_ids.iter().enumerate() {
            state.task_index.insert(id.clone(), (batch_position, position));
        }
        let receipt = IngestReceipt {
            batch_id: batch.id.clone(),
            task_ids,
        };
        tracing::info!(
            batch_id = %receipt.batch_id,
            tasks = receipt.task_ids.len(),
            "batch created"
        );
        state.batches.push(batch);
        Ok(receipt)
    }

    /// Look a task up across all batches.
    pub async fn find_task(&self, task_id: &TaskId) -> Result<(BatchRef, Task), PipelineError> {
        let state = self.state.lock().await;
        let slot = state.slot(task_id)?;
        let batch = state.batches[slot.0].reference();
        Ok((batch, state.task(slot).clone()))
    }

    pub async fn get_task(&self, task_id: &TaskId) -> Result<Task, PipelineError> {
        Ok(self.find_task(task_id).await?.1)
    }

    /// Replace a task record in place.
    ///
    /// # Errors
    /// - `NotFound`: no such batch, or the task is not in that batch.
    /// - `BadRequest`: `updated.id` differs from `task_id`.
    /// - `Internal`: the replacement violates the fixed-pipeline invariant.
    pub async fn replace_task(
        &self,
        batch_id: &BatchId,
        task_id: &TaskId,
        updated: Task,
    ) -> Result<(), PipelineError> {
        if &updated.id != task_id {
            return Err(PipelineError::bad_request(format!(
                "replacement for {task_id} carries id {}",
                updated.id
            )));
        }
        updated.check_steps()?;

        let mut state = self.state.lock().await;
        let batch_position = state.batch_position(batch_id)?;
        let slot = state.slot(task_id)?;
        if slot.0 != batch_position {
            return Err(PipelineError::task_not_found(task_id));
        }
        state.store(slot, updated);
        Ok(())
    }

    /// Read-modify-write of one task under the store lock.
    ///
    /// `f` receives the current record and returns its replacement; if it
    /// fails, the stored task is left unchanged.
    pub async fn update_task<F>(&self, task_id: &TaskId, f: F) -> Result<Task, PipelineError>
    where
        F: FnOnce(&Task) -> Result<Task, PipelineError>,
    {
        let mut state = self.state.lock().await;
        let slot = state.slot(task_id)?;
        let updated = f(state.task(slot))?;
        if &updated.id != task_id {
            return Err(PipelineError::internal(format!(
                "update of {task_id} produced task {}",
                updated.id
            )));
        }
        updated.check_steps()?;
        state.store(slot, updated.clone());
        Ok(updated)
    }

    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<TaskPage, PipelineError> {
        let state = self.state.lock().await;
        if let Some(batch_id) = &query.batch_id {
            state.batch_position(batch_id)?;
        }

        let count_by_status: StatusCounts = state
            .tasks_in(query.batch_id.as_ref())
            .map(|task| task.status)
            .collect();
        let matching: Vec<&Task> = state
            .tasks_in(query.batch_id.as_ref())
            .filter(|task| query.status.is_none_or(|status| task.status == status))
            .collect();

        let (page, size) = query.normalized();
        let tasks = matching
            .iter()
            .skip((page - 1) * size)
            .take(size)
            .map(|task| (*task).clone())
            .collect();
        Ok(TaskPage {
            tasks,
            total_count: matching.len(),
            count_by_status,
            page,
            size,
        })
    }

    /// Ids of tasks in a given status, in store order.
    pub async fn task_ids_with_status(
        &self,
        batch_id: Option<&BatchId>,
        status: TaskStatus,
    ) -> Result<Vec<TaskId>, PipelineError> {
        let state = self.state.lock().await;
        if let Some(batch_id) = batch_id {
            state.batch_position(batch_id)?;
        }
        Ok(state
            .tasks_in(batch_id)
            .filter(|task| task.status == status)
            .map(|task| task.id.clone())
            .collect())
    }

    pub async fn get_batch(&self, batch_id: &BatchId) -> Result<Batch, PipelineError> {
        let state = self.state.lock().await;
        let position = state.batch_position(batch_id)?;
        Ok(state.batches[position].clone())
    }

    pub async fn list_batches(&self) -> Vec<BatchSummary> {
        let state = self.state.lock().await;
        state.batches.iter().map(Batch::summary).collect()
    }

    pub async fn counts_by_status(&self) -> StatusCounts {
        let state = self.state.lock().await;
        state.tasks_in(None).map(|task| task.status).collect()
    }

    /// Drop every batch.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = StoreState::default();
        tracing::info!("task store reset");
    }
}
