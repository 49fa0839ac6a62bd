//! Task record and status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BatchId, TaskId};
use super::step::{STEP_COUNT, StepId, StepRecord};
use crate::error::PipelineError;

/// Task status (closed set).
///
/// State transitions (see `machine::apply`):
/// - Pending -> Processing -> (Processing)* -> Completed
/// - Processing -> Failed | NotReady | ReviewRequired
/// - ReviewRequired -> Completed (approve) | Rejected (reject)
/// - Failed | Rejected | NotReady -> Retrying -> Processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    NotReady,
    Processing,
    ReviewRequired,
    Retrying,
    Completed,
    Failed,
    Rejected,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Pending,
        TaskStatus::NotReady,
        TaskStatus::Processing,
        TaskStatus::ReviewRequired,
        TaskStatus::Retrying,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::NotReady => "not-ready",
            TaskStatus::Processing => "processing",
            TaskStatus::ReviewRequired => "review-required",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Rejected => "rejected",
        }
    }

    /// A worker stops driving the task once it reaches one of these.
    pub fn ends_attempt(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Failed
                | TaskStatus::Rejected
                | TaskStatus::NotReady
                | TaskStatus::ReviewRequired
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the owning batch (not ownership).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRef {
    pub id: BatchId,
    pub name: String,
}

/// One imported row: the identity of a task before it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    pub organisation_id: String,
    pub company_id: String,
    pub le_id: String,
    #[serde(default)]
    pub special_case: bool,
}

impl TaskRow {
    pub fn new(
        organisation_id: impl Into<String>,
        company_id: impl Into<String>,
        le_id: impl Into<String>,
    ) -> Self {
        Self {
            organisation_id: organisation_id.into(),
            company_id: company_id.into(),
            le_id: le_id.into(),
            special_case: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub organisation_id: String,
    pub company_id: String,
    pub le_id: String,
    pub certificate: Option<String>,
    pub special_case: bool,
    pub submitted: bool,
    pub status: TaskStatus,
    pub description: Option<String>,
    pub batch: BatchRef,
    pub steps: Vec<StepRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, row: TaskRow, batch: BatchRef, now: DateTime<Utc>) -> Self {
        Self {
            id,
            organisation_id: row.organisation_id,
            company_id: row.company_id,
            le_id: row.le_id,
            certificate: None,
            special_case: row.special_case,
            submitted: false,
            status: TaskStatus::Pending,
            description: None,
            batch,
            steps: StepRecord::pipeline(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Index of the active step: one past the last completed step.
    ///
    /// Returns 0 when nothing is completed and `STEP_COUNT` once every step is.
    /// Every consumer (state machine, workers, status reporting) goes through
    /// this function.
    pub fn current_step_index(&self) -> usize {
        self.steps
            .iter()
            .rposition(StepRecord::is_completed)
            .map_or(0, |last| last + 1)
    }

    /// The active step, or `None` past the end of the pipeline.
    pub fn current_step(&self) -> Option<StepId> {
        StepId::from_index(self.current_step_index())
    }

    pub fn step_mut(&mut self, id: StepId) -> &mut StepRecord {
        &mut self.steps[id.index()]
    }

    pub fn all_steps_completed(&self) -> bool {
        self.steps.iter().all(StepRecord::is_completed)
    }

    /// Checks the fixed-pipeline invariant: four steps in pipeline order.
    pub fn check_steps(&self) -> Result<(), PipelineError> {
        if self.steps.len() != STEP_COUNT {
            return Err(PipelineError::internal(format!(
                "task {} has {} steps, expected {}",
                self.id,
                self.steps.len(),
                STEP_COUNT
            )));
        }
        if let Some((index, step)) = self
            .steps
            .iter()
            .enumerate()
            .find(|(index, step)| step.id.index() != *index)
        {
            return Err(PipelineError::internal(format!(
                "task {} has step {} at position {}",
                self.id, step.id, index
            )));
        }
        Ok(())
    }
}
