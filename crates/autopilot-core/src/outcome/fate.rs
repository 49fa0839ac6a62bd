//! Fate: the outcome of one task attempt, fixed before execution begins.

use serde::{Deserialize, Serialize};

use crate::domain::{ActionKind, STEP_COUNT, StepId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fate {
    pub will_fail: bool,
    pub failure_step: StepId,
    pub is_not_ready: bool,
    pub will_require_review: bool,
}

impl Fate {
    /// Used by retry runs: every step completes.
    pub fn guaranteed_success() -> Self {
        Self {
            will_fail: false,
            failure_step: StepId::TaxSubmission,
            is_not_ready: false,
            will_require_review: false,
        }
    }

    pub fn is_success(&self) -> bool {
        !self.will_fail && !self.is_not_ready && !self.will_require_review
    }

    /// Decides the next action from the task's current step index.
    ///
    /// Pure: the worker loop calls this with `Task::current_step_index()` after
    /// every transition, so the decision only depends on the fixed fate and
    /// the step history.
    pub fn next_action(&self, current_step: usize) -> PlannedAction {
        if self.is_not_ready {
            return PlannedAction::NotReady(StepId::PayrollDownload);
        }
        if self.will_fail && current_step == self.failure_step.index() {
            return PlannedAction::Fail(self.failure_step);
        }
        if self.will_require_review && current_step == StepId::TaxSubmission.index() {
            return PlannedAction::RequireReview;
        }
        if current_step + 1 >= STEP_COUNT {
            return PlannedAction::Complete;
        }
        PlannedAction::CompleteStep
    }
}

/// The shape of the next transition, before its payload is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    CompleteStep,
    Fail(StepId),
    NotReady(StepId),
    RequireReview,
    Complete,
}

impl PlannedAction {
    /// Terminal for this attempt: the worker stops after applying it.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PlannedAction::CompleteStep)
    }

    pub fn kind(self) -> ActionKind {
        match self {
            PlannedAction::CompleteStep => ActionKind::CompleteStep,
            PlannedAction::Fail(_) => ActionKind::Fail,
            PlannedAction::NotReady(_) => ActionKind::NotReady,
            PlannedAction::RequireReview => ActionKind::ReviewRequired,
            PlannedAction::Complete => ActionKind::Complete,
        }
    }
}
