//! Task state machine.
//!
//! `apply` is the only place a task's status and steps change. It is pure:
//! the input task is left untouched and the updated copy is returned, so the
//! store can swap it in under its lock and readers never see half an update.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::{Action, StepId, StepStatus, Task, TaskStatus, ValidationCheck};
use crate::error::PipelineError;

/// Apply one action to a task.
///
/// # Errors
/// - `BadRequest`: the action is not valid for the task's current status.
/// - `Internal`: the task's step list is malformed.
pub fn apply(task: &Task, action: &Action, now: DateTime<Utc>) -> Result<Task, PipelineError> {
    task.check_steps()?;

    let mut next = task.clone();
    match action {
        Action::Start => start(&mut next, now),
        Action::CompleteStep { checks, data } => {
            require(task, action, &[TaskStatus::Processing])?;
            complete_step(&mut next, checks, data, now)?;
        }
        Action::Fail {
            step,
            reasons,
            checks,
        } => {
            require(task, action, &[TaskStatus::Processing, TaskStatus::Retrying])?;
            fail(&mut next, *step, reasons, checks, now);
        }
        Action::Complete { certificate } => complete(&mut next, certificate, now),
        Action::NotReady { step, checks } => {
            require(task, action, &[TaskStatus::Processing])?;
            not_ready(&mut next, *step, checks, now);
        }
        Action::RequireReview { review_url, checks } => {
            require(task, action, &[TaskStatus::Processing])?;
            require_review(&mut next, review_url, checks, now);
        }
        Action::Approve => {
            require(task, action, &[TaskStatus::ReviewRequired])?;
            approve(&mut next, now);
        }
        Action::Reject { reason } => {
            require(task, action, &[TaskStatus::ReviewRequired])?;
            reject(&mut next, reason, now);
        }
        Action::Retry => {
            require(
                task,
                action,
                &[
                    TaskStatus::Failed,
                    TaskStatus::Rejected,
                    TaskStatus::NotReady,
                    TaskStatus::Retrying,
                ],
            )?;
            next.status = TaskStatus::Retrying;
            next.description = Some("Queued for retry".to_string());
        }
    }
    next.updated_at = now;
    Ok(next)
}

fn require(task: &Task, action: &Action, allowed: &[TaskStatus]) -> Result<(), PipelineError> {
    if allowed.contains(&task.status) {
        Ok(())
    } else {
        Err(PipelineError::bad_request(format!(
            "cannot apply {} to task {} in status {}",
            action.kind(),
            task.id,
            task.status
        )))
    }
}

fn start(task: &mut Task, now: DateTime<Utc>) {
    for step in &mut task.steps {
        step.reset();
    }
    task.steps[0].begin(now);
    task.status = TaskStatus::Processing;
    task.submitted = false;
    task.certificate = None;
    task.description = Some(StepId::PayrollDownload.progress_label().to_string());
}

fn complete_step(
    task: &mut Task,
    checks: &[ValidationCheck],
    data: &Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<(), PipelineError> {
    let current = task
        .current_step()
        .ok_or_else(|| PipelineError::bad_request(format!("task {} has no step left", task.id)))?;

    let step = task.step_mut(current);
    step.finish(StepStatus::Completed, now);
    step.validation_checks = checks.to_vec();
    step.data = data.clone();

    if let Some(next) = StepId::from_index(current.index() + 1) {
        task.step_mut(next).begin(now);
        task.description = Some(next.progress_label().to_string());
    }
    Ok(())
}

/// Marks every step before `until` as completed.
fn complete_steps_before(task: &mut Task, until: StepId, now: DateTime<Utc>) {
    for step in task.steps.iter_mut().take(until.index()) {
        if !step.is_completed() {
            step.finish(StepStatus::Completed, now);
        }
    }
}

fn fail(
    task: &mut Task,
    failed: StepId,
    reasons: &[String],
    checks: &[ValidationCheck],
    now: DateTime<Utc>,
) {
    complete_steps_before(task, failed, now);
    let step = task.step_mut(failed);
    step.finish(StepStatus::Failed, now);
    step.error_reasons = reasons.to_vec();
    step.validation_checks = checks.to_vec();
    step.status_description = reasons.first().cloned();

    task.status = TaskStatus::Failed;
    task.description = Some(format!("Failed at {}", failed.title()));
}

fn complete(task: &mut Task, certificate: &str, now: DateTime<Utc>) {
    for step in &mut task.steps {
        if !step.is_completed() {
            step.finish(StepStatus::Completed, now);
        }
    }
    task.status = TaskStatus::Completed;
    task.submitted = true;
    task.description = None;
    task.certificate = Some(certificate.to_string());
}

fn not_ready(task: &mut Task, waiting: StepId, checks: &[ValidationCheck], now: DateTime<Utc>) {
    complete_steps_before(task, waiting, now);
    let step = task.step_mut(waiting);
    step.finish(StepStatus::NotReady, now);
    step.validation_checks = checks.to_vec();
    step.data = Map::new();
    step.status_description = Some(format!("Waiting for {}", waiting.title().to_lowercase()));

    task.status = TaskStatus::NotReady;
    task.description = Some("Waiting for input data".to_string());
}

fn require_review(
    task: &mut Task,
    review_url: &str,
    checks: &[ValidationCheck],
    now: DateTime<Utc>,
) {
    complete_steps_before(task, StepId::TaxSubmission, now);
    let step = task.step_mut(StepId::TaxSubmission);
    step.finish(StepStatus::ReviewRequired, now);
    step.validation_checks = checks.to_vec();
    step.status_description = Some("Waiting for manual review".to_string());
    step.data = Map::from_iter([("reviewUrl".to_string(), Value::String(review_url.to_string()))]);

    task.status = TaskStatus::ReviewRequired;
    task.description = Some("Review required before submission".to_string());
}

fn approve(task: &mut Task, now: DateTime<Utc>) {
    for id in [StepId::TaxSubmission, StepId::DocumentUpload] {
        task.step_mut(id).finish(StepStatus::Completed, now);
    }
    task.status = TaskStatus::Completed;
    task.submitted = true;
    task.description = None;
}

fn reject(task: &mut Task, reason: &str, now: DateTime<Utc>) {
    let step = task.step_mut(StepId::TaxSubmission);
    step.finish(StepStatus::Failed, now);
    step.error_reasons = vec![reason.to_string()];
    step.status_description = Some(reason.to_string());

    task.status = TaskStatus::Rejected;
    task.description = Some("Rejected during review".to_string());
}
