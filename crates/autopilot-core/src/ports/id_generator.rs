//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）
//! - **SequentialIdGenerator**: 連番（テスト・デモ用、`task-001` 形式）

use std::sync::atomic::{AtomicU64, Ordering};

use ulid::Ulid;

use crate::domain::{BatchId, TaskId};
use crate::ports::Clock;

/// IdGenerator は Batch / Task の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（store は複数の worker から共有される）
pub trait IdGenerator: Send + Sync {
    fn generate_batch_id(&self) -> BatchId;

    fn generate_task_id(&self) -> TaskId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時に FixedClock を使えば timestamp 部分が固定されます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_batch_id(&self) -> BatchId {
        BatchId::with_suffix(self.next_ulid())
    }

    fn generate_task_id(&self) -> TaskId {
        TaskId::with_suffix(self.next_ulid())
    }
}

/// 連番の ID 生成器
///
/// Batch と Task は別のカウンタを持ち、どちらも 1 から始まります。
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next_batch: AtomicU64,
    next_task: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate_batch_id(&self) -> BatchId {
        let n = self.next_batch.fetch_add(1, Ordering::Relaxed) + 1;
        BatchId::with_suffix(n)
    }

    fn generate_task_id(&self) -> TaskId {
        let n = self.next_task.fetch_add(1, Ordering::Relaxed) + 1;
        TaskId::with_suffix(format!("{n:03}"))
    }
}
