//! Simulated step outputs and validation checks.
//!
//! Turns a `PlannedAction` into a concrete `Action`. All display values come
//! from the attempt's `EnrichedData`, so the checks of one run agree with
//! each other.

use serde_json::{Map, Value, json};

use super::fate::PlannedAction;
use super::generator::{EnrichedData, OutcomeGenerator};
use crate::domain::{Action, CheckStatus, StepId, Task, ValidationCheck};

impl OutcomeGenerator {
    pub fn materialize(&self, planned: PlannedAction, task: &Task, data: &EnrichedData) -> Action {
        match planned {
            PlannedAction::CompleteStep => {
                let step = task.current_step().unwrap_or(StepId::DocumentUpload);
                Action::CompleteStep {
                    checks: passing_checks(step, task, data),
                    data: step_output(step, task, data),
                }
            }
            PlannedAction::Fail(step) => {
                let reason = self.failure_reason(step);
                Action::Fail {
                    step,
                    checks: failing_checks(step, &reason, data),
                    reasons: vec![reason],
                }
            }
            PlannedAction::NotReady(step) => Action::NotReady {
                step,
                checks: not_ready_checks(step),
            },
            PlannedAction::RequireReview => Action::RequireReview {
                review_url: self.review_url(task),
                checks: review_checks(data),
            },
            PlannedAction::Complete => Action::Complete {
                certificate: certificate_label(data),
            },
        }
    }
}

pub fn certificate_label(data: &EnrichedData) -> String {
    format!("Certificate {}", data.confirmation_number)
}

pub fn passing_checks(step: StepId, task: &Task, data: &EnrichedData) -> Vec<ValidationCheck> {
    match step {
        StepId::PayrollDownload => vec![
            ValidationCheck::new("payroll-file", "Payroll journal available", CheckStatus::Passed)
                .value(format!("payroll_{}.pdf", task.le_id))
                .download_link(format!("/files/{}/payroll.pdf", task.id)),
            ValidationCheck::new("company", "Company matches legal entity", CheckStatus::Passed)
                .expected(data.company_name.clone())
                .actual(data.company_name.clone()),
        ],
        StepId::DataExtraction => vec![
            ValidationCheck::new("sum-check", "Wage tax sum check", CheckStatus::Passed)
                .value(data.sum_check())
                .expected(data.sum_check())
                .actual(data.sum_check()),
            ValidationCheck::new("tax-id", "Tax number present", CheckStatus::Passed)
                .value(format!("****{}", data.tax_id_last4)),
        ],
        StepId::TaxSubmission => vec![
            ValidationCheck::new("submission", "Tax return accepted", CheckStatus::Passed)
                .value(data.confirmation_number.clone())
                .description(format!("Submitted for {}", data.company_name)),
        ],
        StepId::DocumentUpload => vec![
            ValidationCheck::new("receipt", "Receipt archived", CheckStatus::Passed)
                .download_link(format!("/files/{}/receipt.pdf", task.id)),
        ],
    }
}

pub fn step_output(step: StepId, task: &Task, data: &EnrichedData) -> Map<String, Value> {
    let value = match step {
        StepId::PayrollDownload => json!({
            "fileName": format!("payroll_{}.pdf", task.le_id),
            "companyName": data.company_name,
        }),
        StepId::DataExtraction => json!({
            "sumCheck": data.sum_check(),
            "taxIdLast4": data.tax_id_last4,
        }),
        StepId::TaxSubmission => json!({
            "confirmationNumber": data.confirmation_number,
        }),
        StepId::DocumentUpload => json!({
            "receipt": format!("receipt_{}.pdf", data.confirmation_number),
        }),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn failing_checks(step: StepId, reason: &str, data: &EnrichedData) -> Vec<ValidationCheck> {
    let check = match step {
        StepId::DataExtraction => {
            ValidationCheck::new("sum-check", "Wage tax sum check", CheckStatus::Failed)
                .expected(data.sum_check())
                .actual("0.00 EUR")
        }
        _ => ValidationCheck::new(step.as_str(), step.title(), CheckStatus::Failed),
    };
    vec![check.description(reason)]
}

pub fn not_ready_checks(step: StepId) -> Vec<ValidationCheck> {
    vec![
        ValidationCheck::new("input-available", "Input data available", CheckStatus::Pending)
            .description(format!("{} is waiting for the period to be closed", step.title())),
    ]
}

pub fn review_checks(data: &EnrichedData) -> Vec<ValidationCheck> {
    vec![
        ValidationCheck::new("manual-review", "Manual review", CheckStatus::Pending)
            .value(data.sum_check())
            .description("Amount exceeds the automatic approval limit"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationProfile;
    use crate::domain::{BatchId, BatchRef, TaskId, TaskRow};
    use crate::ports::SeededRandom;
    use chrono::Utc;
    use std::sync::Arc;

    fn task() -> Task {
        Task::new(
            TaskId::from("task-007"),
            TaskRow::new("ORG-1", "CMP-1", "LE-099"),
            BatchRef {
                id: BatchId::from("batch-1"),
                name: "January".to_string(),
            },
            Utc::now(),
        )
    }

    fn generator() -> OutcomeGenerator {
        OutcomeGenerator::new(Arc::new(SeededRandom::new(1)), SimulationProfile::default())
    }

    #[test]
    fn complete_step_targets_current_step() {
        let generator = generator();
        let task = task();
        let data = generator.enriched_data(&task);

        let Action::CompleteStep { checks, data: output } =
            generator.materialize(PlannedAction::CompleteStep, &task, &data)
        else {
            panic!("expected complete-step");
        };
        assert_eq!(checks[0].key, "payroll-file");
        assert_eq!(output["fileName"], "payroll_LE-099.pdf");
    }

    #[test]
    fn fail_carries_reason_and_failing_check() {
        let generator = generator();
        let task = task();
        let data = generator.enriched_data(&task);

        let Action::Fail { step, reasons, checks } =
            generator.materialize(PlannedAction::Fail(StepId::TaxSubmission), &task, &data)
        else {
            panic!("expected fail");
        };
        assert_eq!(step, StepId::TaxSubmission);
        assert_eq!(reasons.len(), 1);
        assert!(checks.iter().all(|c| c.status == CheckStatus::Failed));
        assert_eq!(checks[0].description.as_deref(), Some(reasons[0].as_str()));
    }

    #[test]
    fn review_url_points_at_task() {
        let generator = generator();
        let task = task();
        let data = generator.enriched_data(&task);

        let Action::RequireReview { review_url, .. } =
            generator.materialize(PlannedAction::RequireReview, &task, &data)
        else {
            panic!("expected review");
        };
        assert_eq!(review_url, "https://review.autopilot.local/tasks/task-007/review");
    }

    #[test]
    fn checks_of_one_run_share_values() {
        let data = EnrichedData::from_le_id("LE-099", 420_000);
        let extraction = passing_checks(StepId::DataExtraction, &task(), &data);
        let review = review_checks(&data);
        assert_eq!(extraction[0].value, review[0].value);
    }
}
