//! Orchestrator - 同時実行数を制限したタスクパイプラインの駆動
//!
//! # フロー
//! 1. `start_run` / `retry_run` で task_id のキューを作る
//! 2. `max_concurrent` 本の worker を spawn する（worker_loop.rs）
//! 3. 各 worker はキューから 1 件取り出し、そのタスクの lifecycle を最後まで実行する
//! 4. すべての worker が終わったら Idle に戻る
//!
//! キャンセルは `watch` チャネル 1 本で全 worker に伝えます。
//! 適用済みのアクションは巻き戻しません。

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::service::PipelineService;
use super::worker_loop::{WorkQueue, worker_loop};
use crate::config::OrchestratorConfig;
use crate::domain::{ActionKind, ActionParams, Task, TaskId};
use crate::error::PipelineError;
use crate::observability::Progress;
use crate::ports::Sleeper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Idle,
    Running,
    Retrying,
}

/// Counters of the current run.
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    pub(crate) completed: AtomicUsize,
    pub(crate) total: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) peak_in_flight: AtomicUsize,
}

impl RunCounters {
    fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.in_flight.store(0, Ordering::SeqCst);
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    /// Claims an in-flight slot if fewer than `limit` are taken.
    pub(crate) fn try_acquire_slot(&self, limit: usize) -> bool {
        let acquired = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1));
        match acquired {
            Ok(previous) => {
                self.peak_in_flight.fetch_max(previous + 1, Ordering::SeqCst);
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn release_slot(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Drops a task that turned out not to belong in the run.
    pub(crate) fn forget_one(&self) {
        let _ = self
            .total
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Marks one task lifecycle as done. Never goes past `total`.
    pub(crate) fn mark_completed(&self) {
        let total = self.total.load(Ordering::SeqCst);
        let _ = self
            .completed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < total).then_some(n + 1));
    }
}

/// State shared by the orchestrator handle and its workers.
pub(crate) struct RunContext {
    pub(crate) service: Arc<PipelineService>,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) config: OrchestratorConfig,
    pub(crate) counters: RunCounters,
    pub(crate) cancel_tx: watch::Sender<bool>,
    mode: Mutex<RunMode>,
}

impl RunContext {
    fn mode(&self) -> MutexGuard<'_, RunMode> {
        self.mode.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Which kind of run a worker is part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunKind {
    /// Fate rolled per task.
    Full,
    /// Forced success for previously failed tasks. Each task is moved to
    /// `retrying` by the worker that picks it up.
    Retry,
}

pub struct Orchestrator {
    ctx: Arc<RunContext>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        service: Arc<PipelineService>,
        sleeper: Arc<dyn Sleeper>,
        config: OrchestratorConfig,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            ctx: Arc::new(RunContext {
                service,
                sleeper,
                config,
                counters: RunCounters::default(),
                cancel_tx,
                mode: Mutex::new(RunMode::Idle),
            }),
            supervisor: Mutex::new(None),
        }
    }

    pub fn service(&self) -> &Arc<PipelineService> {
        &self.ctx.service
    }

    /// Starts a full run over `task_ids`.
    ///
    /// Returns `false` (and does nothing) if a run is already in progress.
    /// Must be called from within a tokio runtime.
    pub fn start_run(&self, task_ids: Vec<TaskId>) -> bool {
        self.launch(task_ids, RunKind::Full)
    }

    /// Re-runs previously failed tasks with a guaranteed-success fate.
    ///
    /// Same guard as `start_run`.
    pub fn retry_run(&self, failed_task_ids: Vec<TaskId>) -> bool {
        self.launch(failed_task_ids, RunKind::Retry)
    }

    /// Requests cancellation. Workers stop at their next suspension point.
    pub fn cancel(&self) {
        if self.mode() != RunMode::Idle {
            tracing::info!("cancellation requested");
        }
        self.ctx.cancel_tx.send_replace(true);
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.ctx.counters.completed.load(Ordering::SeqCst),
            total: self.ctx.counters.total.load(Ordering::SeqCst),
            running: self.mode() != RunMode::Idle,
        }
    }

    pub fn mode(&self) -> RunMode {
        *self.ctx.mode()
    }

    /// Highest number of simultaneously in-flight tasks seen in the current run.
    pub fn peak_in_flight(&self) -> usize {
        self.ctx.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Waits until the current run (if any) has finished.
    pub async fn wait_idle(&self) {
        let handle = self
            .supervisor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "run supervisor panicked");
        }
    }

    /// Approves a task waiting in review. Single shot, not run through the pool.
    pub async fn approve_task(&self, task_id: &TaskId) -> Result<Task, PipelineError> {
        self.ctx
            .service
            .apply_action(task_id, ActionKind::Approve, &ActionParams::default())
            .await
    }

    /// Rejects a task waiting in review.
    pub async fn reject_task(
        &self,
        task_id: &TaskId,
        reason: Option<String>,
    ) -> Result<Task, PipelineError> {
        let params = ActionParams {
            reason,
            ..ActionParams::default()
        };
        self.ctx
            .service
            .apply_action(task_id, ActionKind::Reject, &params)
            .await
    }

    fn launch(&self, task_ids: Vec<TaskId>, kind: RunKind) -> bool {
        let mut mode = self.ctx.mode();
        if *mode != RunMode::Idle {
            tracing::warn!(mode = ?*mode, "run already in progress, ignoring request");
            return false;
        }

        // One entry per task id: two workers must never drive the same task.
        let mut seen = HashSet::new();
        let queue: VecDeque<TaskId> = task_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        *mode = match kind {
            RunKind::Full => RunMode::Running,
            RunKind::Retry => RunMode::Retrying,
        };
        self.ctx.counters.reset(queue.len());
        self.ctx.cancel_tx.send_replace(false);
        drop(mode);

        tracing::info!(
            tasks = queue.len(),
            max_concurrent = self.ctx.config.max_concurrent,
            kind = ?kind,
            "run started"
        );
        let handle = tokio::spawn(supervise(Arc::clone(&self.ctx), queue, kind));
        *self
            .supervisor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        true
    }
}

/// Spawns the workers of one run and waits for all of them.
async fn supervise(ctx: Arc<RunContext>, queue: VecDeque<TaskId>, kind: RunKind) {
    let queue: WorkQueue = Arc::new(tokio::sync::Mutex::new(queue));

    let mut joins = Vec::with_capacity(ctx.config.max_concurrent);
    for worker_id in 0..ctx.config.max_concurrent {
        let ctx = Arc::clone(&ctx);
        let queue = Arc::clone(&queue);
        let cancel_rx = ctx.cancel_tx.subscribe();
        joins.push(tokio::spawn(async move {
            worker_loop(worker_id, ctx, queue, kind, cancel_rx).await;
        }));
    }
    for join in joins {
        if let Err(e) = join.await {
            tracing::error!(error = %e, "worker panicked");
        }
    }

    let completed = ctx.counters.completed.load(Ordering::SeqCst);
    let total = ctx.counters.total.load(Ordering::SeqCst);
    tracing::info!(completed, total, cancelled = *ctx.cancel_tx.borrow(), "run finished");
    *ctx.mode() = RunMode::Idle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_capped_and_peak_recorded() {
        let counters = RunCounters::default();
        assert!(counters.try_acquire_slot(2));
        assert!(counters.try_acquire_slot(2));
        assert!(!counters.try_acquire_slot(2));

        counters.release_slot();
        assert!(counters.try_acquire_slot(2));
        assert_eq!(counters.peak_in_flight.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn forgotten_tasks_leave_the_total() {
        let counters = RunCounters::default();
        counters.reset(1);
        counters.forget_one();
        counters.forget_one();
        assert_eq!(counters.total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn completed_never_exceeds_total() {
        let counters = RunCounters::default();
        counters.reset(2);
        for _ in 0..5 {
            counters.mark_completed();
        }
        assert_eq!(counters.completed.load(Ordering::SeqCst), 2);
    }
}
