//! Domain model (ids, steps, tasks, batches, actions).

pub mod action;
pub mod batch;
pub mod ids;
pub mod step;
pub mod task;

pub use action::{Action, ActionKind, ActionParams};
pub use batch::{Batch, BatchSummary};
pub use ids::{BatchId, TaskId};
pub use step::{CheckStatus, STEP_COUNT, StepId, StepRecord, StepStatus, ValidationCheck};
pub use task::{BatchRef, Task, TaskRow, TaskStatus};
