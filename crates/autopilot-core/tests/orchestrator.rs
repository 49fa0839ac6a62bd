mod common;

use autopilot_core::RunMode;
use autopilot_core::config::SimulationProfile;
use autopilot_core::domain::{ActionParams, StepStatus, TaskId, TaskStatus};
use autopilot_core::error::PipelineError;
use autopilot_core::ports::TokioSleeper;
use autopilot_core::store::TaskQuery;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn full_run_respects_concurrency_limit_and_counts_every_task() {
    let pipeline = common::pipeline(42, SimulationProfile::default());
    let ids = common::ingest(&pipeline, 10).await;
    let orchestrator = &pipeline.orchestrator;

    assert!(orchestrator.start_run(ids));
    assert_eq!(orchestrator.mode(), RunMode::Running);
    orchestrator.wait_idle().await;

    let progress = orchestrator.progress();
    assert_eq!(progress.total, 10);
    assert_eq!(progress.completed, 10);
    assert!(!progress.running);
    assert_eq!(orchestrator.peak_in_flight(), 4);

    let page = pipeline.store.list_tasks(&TaskQuery::new(1, 100)).await.unwrap();
    for task in &page.tasks {
        assert!(task.status.ends_attempt(), "{} left in {}", task.id, task.status);
        if task.status == TaskStatus::Completed {
            assert!(task.all_steps_completed());
            assert!(task.certificate.is_some());
            assert!(task.submitted);
        }
    }
    assert_eq!(page.count_by_status.total(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_workers_never_exceed_the_limit() {
    let pipeline = common::pipeline(7, SimulationProfile::default());
    let ids = common::ingest(&pipeline, 25).await;

    assert!(pipeline.orchestrator.start_run(ids));
    pipeline.orchestrator.wait_idle().await;

    assert!(pipeline.orchestrator.peak_in_flight() <= 4);
    assert_eq!(pipeline.orchestrator.progress().completed, 25);
}

#[tokio::test]
async fn duplicate_ids_run_once() {
    let pipeline = common::pipeline(1, SimulationProfile::always_succeed());
    let ids = common::ingest(&pipeline, 2).await;
    let doubled = vec![ids[0].clone(), ids[1].clone(), ids[0].clone()];

    assert!(pipeline.orchestrator.start_run(doubled));
    pipeline.orchestrator.wait_idle().await;

    assert_eq!(pipeline.orchestrator.progress().total, 2);
    assert_eq!(pipeline.orchestrator.progress().completed, 2);
}

#[tokio::test]
async fn second_start_is_ignored_while_running() {
    let pipeline = common::pipeline(3, SimulationProfile::always_succeed());
    let ids = common::ingest(&pipeline, 3).await;
    let orchestrator = &pipeline.orchestrator;

    assert!(orchestrator.start_run(ids.clone()));
    assert!(!orchestrator.start_run(ids.clone()));
    assert!(!orchestrator.retry_run(ids.clone()));
    orchestrator.wait_idle().await;

    assert_eq!(orchestrator.mode(), RunMode::Idle);
    assert!(orchestrator.start_run(ids));
    orchestrator.wait_idle().await;
}

#[tokio::test]
async fn cancel_before_workers_start_leaves_tasks_untouched() {
    let pipeline = common::pipeline(5, SimulationProfile::default());
    let ids = common::ingest(&pipeline, 6).await;

    assert!(pipeline.orchestrator.start_run(ids));
    pipeline.orchestrator.cancel();
    pipeline.orchestrator.wait_idle().await;

    let progress = pipeline.orchestrator.progress();
    assert_eq!(progress.completed, 0);
    assert!(!progress.running);
    let counts = pipeline.store.counts_by_status().await;
    assert_eq!(counts.get(TaskStatus::Pending), 6);
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_run_stops_every_worker_in_place() {
    let pipeline =
        common::pipeline_with_sleeper(21, SimulationProfile::default(), Arc::new(TokioSleeper));
    let ids = common::ingest(&pipeline, 10).await;
    let all = TaskQuery::new(1, 100);

    assert!(pipeline.orchestrator.start_run(ids));
    // past the first step wait, below the processing floor: four tasks in flight
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let before = pipeline.store.list_tasks(&all).await.unwrap();
    assert_eq!(before.count_by_status.get(TaskStatus::Pending), 6);
    assert_eq!(pipeline.orchestrator.peak_in_flight(), 4);

    pipeline.orchestrator.cancel();
    pipeline.orchestrator.wait_idle().await;

    let after = pipeline.store.list_tasks(&all).await.unwrap();
    assert_eq!(after.tasks, before.tasks);
    let progress = pipeline.orchestrator.progress();
    assert!(progress.completed < progress.total);
    assert_eq!(progress.completed, 0);
    assert!(!progress.running);
}

#[tokio::test]
async fn cancelled_retry_run_can_be_retried_again() {
    let pipeline = common::pipeline(13, SimulationProfile::default());
    let ids = common::ingest(&pipeline, 6).await;
    let none = ActionParams::default();
    for id in &ids {
        pipeline.service.apply_named_action(id, "start", &none).await.unwrap();
        pipeline.service.apply_named_action(id, "fail", &none).await.unwrap();
    }

    assert!(pipeline.orchestrator.retry_run(ids.clone()));
    pipeline.orchestrator.cancel();
    pipeline.orchestrator.wait_idle().await;

    let failed = pipeline
        .store
        .task_ids_with_status(None, TaskStatus::Failed)
        .await
        .unwrap();
    assert_eq!(failed, ids);

    assert!(pipeline.orchestrator.retry_run(failed));
    pipeline.orchestrator.wait_idle().await;
    let progress = pipeline.orchestrator.progress();
    assert_eq!(progress.total, 6);
    assert_eq!(progress.completed, 6);
    let counts = pipeline.store.counts_by_status().await;
    assert_eq!(counts.get(TaskStatus::Completed), 6);
}

#[rstest]
#[case(1)]
#[case(17)]
#[case(2024)]
#[tokio::test]
async fn retry_run_forces_success_for_failed_task(#[case] seed: u64) {
    let pipeline = common::pipeline(seed, SimulationProfile::default());
    common::ingest(&pipeline, 10).await;
    let id = TaskId::from("task-007");
    let none = ActionParams::default();
    pipeline.service.apply_named_action(&id, "start", &none).await.unwrap();
    pipeline
        .service
        .apply_named_action(&id, "fail", &ActionParams::failure_step("data-extraction"))
        .await
        .unwrap();

    assert!(pipeline.orchestrator.retry_run(vec![id.clone()]));
    assert_eq!(pipeline.orchestrator.mode(), RunMode::Retrying);
    pipeline.orchestrator.wait_idle().await;

    let task = pipeline.store.get_task(&id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert!(task.steps.iter().all(|s| s.error_reasons.is_empty()));
    assert_eq!(pipeline.orchestrator.progress().completed, 1);
}

#[tokio::test]
async fn retry_run_skips_tasks_that_cannot_be_retried() {
    let pipeline = common::pipeline(11, SimulationProfile::default());
    let ids = common::ingest(&pipeline, 3).await;
    let none = ActionParams::default();
    pipeline.service.apply_named_action(&ids[0], "start", &none).await.unwrap();
    pipeline.service.apply_named_action(&ids[0], "fail", &none).await.unwrap();

    // ids[1] is still pending, task-404 does not exist
    let request = vec![ids[0].clone(), ids[1].clone(), TaskId::from("task-404")];
    assert!(pipeline.orchestrator.retry_run(request));
    pipeline.orchestrator.wait_idle().await;

    let progress = pipeline.orchestrator.progress();
    assert_eq!(progress.total, 1);
    assert_eq!(progress.completed, 1);
    let untouched = pipeline.store.get_task(&ids[1]).await.unwrap();
    assert_eq!(untouched.status, TaskStatus::Pending);
}

#[tokio::test]
async fn review_checkpoint_is_resolved_by_approve_or_reject() {
    let review_only = SimulationProfile {
        review_probability: 1.0,
        ..SimulationProfile::always_succeed()
    };
    let pipeline = common::pipeline(9, review_only);
    let ids = common::ingest(&pipeline, 2).await;

    assert!(pipeline.orchestrator.start_run(ids.clone()));
    pipeline.orchestrator.wait_idle().await;
    let counts = pipeline.store.counts_by_status().await;
    assert_eq!(counts.get(TaskStatus::ReviewRequired), 2);

    let review = pipeline.store.get_task(&ids[0]).await.unwrap();
    assert_eq!(review.current_step_index(), 2);
    assert!(review.steps[2].data.contains_key("reviewUrl"));

    let approved = pipeline.orchestrator.approve_task(&ids[0]).await.unwrap();
    assert_eq!(approved.status, TaskStatus::Completed);
    assert!(approved.all_steps_completed());

    let rejected = pipeline
        .orchestrator
        .reject_task(&ids[1], Some("Amounts do not match".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, TaskStatus::Rejected);
    assert_eq!(rejected.steps[2].status, StepStatus::Failed);

    let err = pipeline.orchestrator.approve_task(&ids[0]).await.unwrap_err();
    assert!(matches!(err, PipelineError::BadRequest(_)));
}

#[tokio::test]
async fn not_ready_stops_at_payroll_download() {
    let not_ready = SimulationProfile {
        not_ready_probability: 1.0,
        ..SimulationProfile::always_succeed()
    };
    let pipeline = common::pipeline(4, not_ready);
    let ids = common::ingest(&pipeline, 1).await;

    assert!(pipeline.orchestrator.start_run(ids.clone()));
    pipeline.orchestrator.wait_idle().await;

    let task = pipeline.store.get_task(&ids[0]).await.unwrap();
    assert_eq!(task.status, TaskStatus::NotReady);
    assert_eq!(task.steps[0].status, StepStatus::NotReady);
}
