//! PipelineService - アクション適用の境界
//!
//! 呼び出し側（ポーリングクライアント、orchestrator の worker）は
//! すべてここを通して state machine を動かします。
//! アクションの中身（理由、validation check、出力データ）はここで組み立て、
//! store のロック内で `machine::apply` と置き換えを一度に行います。

use std::sync::Arc;

use crate::domain::{Action, ActionKind, ActionParams, Task, TaskId};
use crate::error::PipelineError;
use crate::machine;
use crate::outcome::payload::{certificate_label, failing_checks, not_ready_checks};
use crate::outcome::{EnrichedData, OutcomeGenerator, PlannedAction};
use crate::ports::Clock;
use crate::store::TaskStore;

const DEFAULT_REJECTION_REASON: &str = "Rejected during manual review";

pub struct PipelineService {
    store: Arc<TaskStore>,
    generator: Arc<OutcomeGenerator>,
    clock: Arc<dyn Clock>,
}

impl PipelineService {
    pub fn new(store: Arc<TaskStore>, generator: Arc<OutcomeGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            generator,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn generator(&self) -> &Arc<OutcomeGenerator> {
        &self.generator
    }

    /// RPC entry point: `apply_action(task_id, "fail", {failureStep})`.
    ///
    /// # Errors
    /// - `NotFound`: unknown task id.
    /// - `BadRequest`: unknown action or step name, or an action invalid for the
    ///   task's current status.
    pub async fn apply_named_action(
        &self,
        task_id: &TaskId,
        action: &str,
        params: &ActionParams,
    ) -> Result<Task, PipelineError> {
        let kind: ActionKind = action.parse()?;
        self.apply_action(task_id, kind, params).await
    }

    pub async fn apply_action(
        &self,
        task_id: &TaskId,
        kind: ActionKind,
        params: &ActionParams,
    ) -> Result<Task, PipelineError> {
        let now = self.clock.now();
        let updated = self
            .store
            .update_task(task_id, |task| {
                let action = self.build_action(kind, params, task)?;
                machine::apply(task, &action, now)
            })
            .await?;
        tracing::debug!(task_id = %task_id, action = %kind, status = %updated.status, "action applied");
        Ok(updated)
    }

    /// Applies an already materialised action.
    pub async fn apply(&self, task_id: &TaskId, action: &Action) -> Result<Task, PipelineError> {
        let now = self.clock.now();
        self.store
            .update_task(task_id, |task| machine::apply(task, action, now))
            .await
    }

    /// Applies the next step of a worker's plan. The payload is built from the
    /// stored task under the lock, so `CompleteStep` always targets the step
    /// that is current at that moment.
    pub async fn apply_planned(
        &self,
        task_id: &TaskId,
        planned: PlannedAction,
        data: &EnrichedData,
    ) -> Result<Task, PipelineError> {
        let now = self.clock.now();
        self.store
            .update_task(task_id, |task| {
                let action = self.generator.materialize(planned, task, data);
                machine::apply(task, &action, now)
            })
            .await
    }

    fn build_action(
        &self,
        kind: ActionKind,
        params: &ActionParams,
        task: &Task,
    ) -> Result<Action, PipelineError> {
        let action = match kind {
            ActionKind::Start => Action::Start,
            ActionKind::CompleteStep => self.generator.materialize(
                PlannedAction::CompleteStep,
                task,
                &self.generator.enriched_data(task),
            ),
            ActionKind::Fail => {
                let step = params.failure_step_or_default()?;
                let reason = params
                    .reason
                    .clone()
                    .unwrap_or_else(|| self.generator.failure_reason(step));
                let data = self.generator.enriched_data(task);
                Action::Fail {
                    step,
                    checks: failing_checks(step, &reason, &data),
                    reasons: vec![reason],
                }
            }
            ActionKind::Complete => Action::Complete {
                certificate: certificate_label(&self.generator.enriched_data(task)),
            },
            ActionKind::NotReady => {
                let step = params.step_or_default()?;
                Action::NotReady {
                    step,
                    checks: not_ready_checks(step),
                }
            }
            ActionKind::ReviewRequired => self.generator.materialize(
                PlannedAction::RequireReview,
                task,
                &self.generator.enriched_data(task),
            ),
            ActionKind::Approve => Action::Approve,
            ActionKind::Reject => Action::Reject {
                reason: params
                    .reason
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
            },
            ActionKind::Retry => Action::Retry,
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationProfile;
    use crate::domain::{StepStatus, TaskRow, TaskStatus};
    use crate::ports::{FixedClock, SeededRandom, SequentialIdGenerator};
    use chrono::{TimeZone, Utc};

    async fn service_with_task(le_id: &str) -> (PipelineService, TaskId) {
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));
        let store = Arc::new(TaskStore::new(
            Arc::new(SequentialIdGenerator::new()),
            Arc::clone(&clock),
        ));
        let receipt = store
            .ingest_rows("January", vec![TaskRow::new("ORG-1", "CMP-1", le_id)])
            .await
            .unwrap();
        let generator = Arc::new(OutcomeGenerator::new(
            Arc::new(SeededRandom::new(9)),
            SimulationProfile::default(),
        ));
        let service = PipelineService::new(store, generator, clock);
        (service, receipt.task_ids[0].clone())
    }

    #[tokio::test]
    async fn le_099_scenario_through_named_actions() {
        let (service, id) = service_with_task("LE-099").await;
        let none = ActionParams::default();

        let task = service.apply_named_action(&id, "start", &none).await.unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.steps[0].started_at.is_some());

        let task = service
            .apply_named_action(&id, "complete-step", &none)
            .await
            .unwrap();
        assert_eq!(task.steps[0].status, StepStatus::Completed);
        assert!(task.steps[1].started_at.is_some());

        let task = service
            .apply_named_action(&id, "fail", &ActionParams::failure_step("tax-submission"))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.steps[2].status, StepStatus::Failed);
        assert!(!task.steps[2].error_reasons.is_empty());
        assert_eq!(task.steps[3].status, StepStatus::Pending);

        let stored = service.store().get_task(&id).await.unwrap();
        assert_eq!(stored, task);
    }

    #[tokio::test]
    async fn fail_without_step_defaults_to_tax_submission() {
        let (service, id) = service_with_task("LE-001").await;
        let none = ActionParams::default();
        service.apply_named_action(&id, "start", &none).await.unwrap();

        let task = service.apply_named_action(&id, "fail", &none).await.unwrap();
        assert_eq!(task.steps[2].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn invalid_requests_are_typed_errors() {
        let (service, id) = service_with_task("LE-001").await;
        let none = ActionParams::default();

        let err = service
            .apply_named_action(&id, "complete-step", &none)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));

        let err = service.apply_named_action(&id, "explode", &none).await.unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));

        let err = service
            .apply_named_action(&TaskId::from("task-404"), "start", &none)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));

        // a rejected request leaves the task as it was
        let task = service.store().get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn reject_uses_given_reason() {
        let (service, id) = service_with_task("LE-001").await;
        let none = ActionParams::default();
        service.apply_named_action(&id, "start", &none).await.unwrap();
        service
            .apply_named_action(&id, "review-required", &none)
            .await
            .unwrap();

        let params = ActionParams {
            reason: Some("Wrong tax period".to_string()),
            ..ActionParams::default()
        };
        let task = service.apply_named_action(&id, "reject", &params).await.unwrap();
        assert_eq!(task.status, TaskStatus::Rejected);
        assert_eq!(task.steps[2].error_reasons, vec!["Wrong tax period".to_string()]);
    }
}
