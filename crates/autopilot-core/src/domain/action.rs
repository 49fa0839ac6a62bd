//! Actions accepted by the task state machine.
//!
//! `ActionKind` is the wire-level name a caller sends; `Action` is the fully
//! materialised transition (reasons, checks and output data already decided)
//! that `machine::apply` consumes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::step::{StepId, ValidationCheck};
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start,
    CompleteStep {
        checks: Vec<ValidationCheck>,
        data: serde_json::Map<String, serde_json::Value>,
    },
    Fail {
        step: StepId,
        reasons: Vec<String>,
        checks: Vec<ValidationCheck>,
    },
    Complete {
        certificate: String,
    },
    NotReady {
        step: StepId,
        checks: Vec<ValidationCheck>,
    },
    RequireReview {
        review_url: String,
        checks: Vec<ValidationCheck>,
    },
    Approve,
    Reject {
        reason: String,
    },
    Retry,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Start => ActionKind::Start,
            Action::CompleteStep { .. } => ActionKind::CompleteStep,
            Action::Fail { .. } => ActionKind::Fail,
            Action::Complete { .. } => ActionKind::Complete,
            Action::NotReady { .. } => ActionKind::NotReady,
            Action::RequireReview { .. } => ActionKind::ReviewRequired,
            Action::Approve => ActionKind::Approve,
            Action::Reject { .. } => ActionKind::Reject,
            Action::Retry => ActionKind::Retry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Start,
    CompleteStep,
    Fail,
    Complete,
    NotReady,
    ReviewRequired,
    Approve,
    Reject,
    Retry,
}

impl ActionKind {
    const ALL: [ActionKind; 9] = [
        ActionKind::Start,
        ActionKind::CompleteStep,
        ActionKind::Fail,
        ActionKind::Complete,
        ActionKind::NotReady,
        ActionKind::ReviewRequired,
        ActionKind::Approve,
        ActionKind::Reject,
        ActionKind::Retry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::CompleteStep => "complete-step",
            ActionKind::Fail => "fail",
            ActionKind::Complete => "complete",
            ActionKind::NotReady => "not-ready",
            ActionKind::ReviewRequired => "review-required",
            ActionKind::Approve => "approve",
            ActionKind::Reject => "reject",
            ActionKind::Retry => "retry",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PipelineError::bad_request(format!("unknown action: {s}")))
    }
}

/// Optional parameters of an `apply_action` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParams {
    /// Step for `fail`; defaults to tax-submission when omitted.
    pub failure_step: Option<String>,
    /// Step for `not-ready`; defaults to payroll-download when omitted.
    pub step: Option<String>,
    /// Free-form reason for `fail` and `reject`.
    pub reason: Option<String>,
}

impl ActionParams {
    pub fn failure_step(step: impl Into<String>) -> Self {
        Self {
            failure_step: Some(step.into()),
            ..Self::default()
        }
    }

    pub fn failure_step_or_default(&self) -> Result<StepId, PipelineError> {
        self.failure_step
            .as_deref()
            .map_or(Ok(StepId::TaxSubmission), |s| s.parse())
    }

    pub fn step_or_default(&self) -> Result<StepId, PipelineError> {
        self.step
            .as_deref()
            .map_or(Ok(StepId::PayrollDownload), |s| s.parse())
    }
}
