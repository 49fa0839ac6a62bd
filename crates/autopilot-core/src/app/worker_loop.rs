//! Worker loop と 1 タスク分の lifecycle
//!
//! worker はキューが空になるまでタスクを 1 件ずつ取り出して最後まで流します。
//! 待機（step の所要時間、処理時間の下限）はすべて cancel と競合させます。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};

use super::orchestrator::{RunContext, RunKind};
use crate::domain::{Action, ActionKind, ActionParams, TaskId, TaskStatus};
use crate::error::{ErrorKind, PipelineError};
use crate::outcome::Fate;
use crate::ports::Sleeper;

pub(crate) type WorkQueue = Arc<Mutex<VecDeque<TaskId>>>;

/// How one lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Finished(TaskStatus),
    /// The task could not be retried; it leaves the run.
    Skipped,
    Cancelled,
}

pub(crate) async fn worker_loop(
    worker_id: usize,
    ctx: Arc<RunContext>,
    queue: WorkQueue,
    kind: RunKind,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let limit = ctx.config.max_concurrent;
    loop {
        if *cancel_rx.borrow() {
            break;
        }

        // 空かどうかの判定と取り出しは同じロックの中で行う
        let mut pending = queue.lock().await;
        if pending.is_empty() {
            break;
        }
        if !ctx.counters.try_acquire_slot(limit) {
            drop(pending);
            ctx.sleeper.sleep(ctx.config.idle_poll()).await;
            continue;
        }
        let Some(task_id) = pending.pop_front() else {
            ctx.counters.release_slot();
            break;
        };
        drop(pending);

        tracing::debug!(worker_id, task_id = %task_id, "task picked up");
        let result = run_lifecycle(&ctx, &task_id, kind, &mut cancel_rx).await;
        ctx.counters.release_slot();

        match result {
            Ok(Lifecycle::Finished(status)) => {
                tracing::info!(worker_id, task_id = %task_id, status = %status, "task finished");
                ctx.counters.mark_completed();
            }
            Ok(Lifecycle::Skipped) => ctx.counters.forget_one(),
            Ok(Lifecycle::Cancelled) => {
                tracing::info!(worker_id, task_id = %task_id, "task interrupted by cancellation");
                break;
            }
            Err(e) => {
                log_lifecycle_error(worker_id, &task_id, &e);
                ctx.counters.mark_completed();
            }
        }
    }
    tracing::debug!(worker_id, "worker stopped");
}

/// Drives one task from `Start` to the terminal action of its fate.
async fn run_lifecycle(
    ctx: &RunContext,
    task_id: &TaskId,
    kind: RunKind,
    cancel_rx: &mut watch::Receiver<bool>,
) -> Result<Lifecycle, PipelineError> {
    let generator = ctx.service.generator();
    let fate = match kind {
        RunKind::Full => generator.roll_fate(),
        RunKind::Retry => {
            if *cancel_rx.borrow() {
                return Ok(Lifecycle::Cancelled);
            }
            let retry = ActionParams::default();
            match ctx.service.apply_action(task_id, ActionKind::Retry, &retry).await {
                Ok(_) => {}
                Err(e) if e.kind() != ErrorKind::Internal => {
                    tracing::warn!(task_id = %task_id, error = %e, "skipping task in retry run");
                    return Ok(Lifecycle::Skipped);
                }
                Err(e) => return Err(e),
            }
            Fate::guaranteed_success()
        }
    };
    let floor = generator.processing_duration();
    tracing::debug!(task_id = %task_id, success = fate.is_success(), ?fate, "fate rolled");

    let task = ctx.service.apply(task_id, &Action::Start).await?;
    let data = generator.enriched_data(&task);
    let mut current = task.current_step_index();
    let mut waited = Duration::ZERO;

    let status = loop {
        let planned = fate.next_action(current);
        let wait = generator.step_duration();
        if pause(ctx.sleeper.as_ref(), wait, cancel_rx).await {
            return Ok(Lifecycle::Cancelled);
        }
        waited += wait;

        tracing::debug!(task_id = %task_id, step = current, action = %planned.kind(), "applying");
        let task = ctx.service.apply_planned(task_id, planned, &data).await?;
        if planned.is_terminal() {
            if !task.status.ends_attempt() {
                return Err(PipelineError::internal(format!(
                    "{} left task {task_id} in {}",
                    planned.kind(),
                    task.status
                )));
            }
            break task.status;
        }
        current = task.current_step_index();
    };

    let remainder = floor.saturating_sub(waited);
    if !remainder.is_zero() && pause(ctx.sleeper.as_ref(), remainder, cancel_rx).await {
        return Ok(Lifecycle::Cancelled);
    }
    Ok(Lifecycle::Finished(status))
}

/// Sleeps for `duration` unless cancelled first. Returns `true` when cancelled.
async fn pause(
    sleeper: &dyn Sleeper,
    duration: Duration,
    cancel_rx: &mut watch::Receiver<bool>,
) -> bool {
    if *cancel_rx.borrow() {
        return true;
    }
    let slept = tokio::select! {
        _ = sleeper.sleep(duration) => true,
        _ = wait_cancelled(cancel_rx) => false,
    };
    !slept || *cancel_rx.borrow()
}

async fn wait_cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            // sender gone: nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }
}

fn log_lifecycle_error(worker_id: usize, task_id: &TaskId, error: &PipelineError) {
    match error.kind() {
        ErrorKind::NotFound | ErrorKind::BadRequest => {
            tracing::warn!(worker_id, task_id = %task_id, error = %error, "task lifecycle aborted");
        }
        ErrorKind::Internal => {
            tracing::error!(worker_id, task_id = %task_id, error = %error, "task lifecycle aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::InstantSleeper;

    #[tokio::test]
    async fn pause_returns_immediately_when_already_cancelled() {
        let (tx, mut rx) = watch::channel(true);
        assert!(pause(&InstantSleeper, Duration::from_secs(3600), &mut rx).await);
        drop(tx);
    }

    #[tokio::test]
    async fn pause_completes_without_cancellation() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(!pause(&InstantSleeper, Duration::from_millis(5), &mut rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_is_interrupted_by_cancel() {
        let (tx, mut rx) = watch::channel(false);
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send_replace(true);
            tx
        });

        let cancelled = pause(&crate::ports::TokioSleeper, Duration::from_secs(3600), &mut rx).await;
        assert!(cancelled);
        let _tx = canceller.await.unwrap();
    }
}
