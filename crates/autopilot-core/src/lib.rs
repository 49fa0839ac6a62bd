//! autopilot-core
//!
//! Simulator of an automated payroll-tax pipeline: each task walks through
//! four fixed steps (payroll download, data extraction, tax submission,
//! document upload) with injected delays, failures, not-ready conditions and
//! manual review checkpoints.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, step, task, batch, action）
//! - **machine**: 純粋な状態遷移 `apply(task, action, now)`
//! - **outcome**: fate の決定と、アクションの中身（checks, data）の生成
//! - **store**: インメモリの task store
//! - **app**: service / orchestrator / builder
//! - **ports**: Clock, RandomSource, Sleeper, IdGenerator
//! - **config**, **error**, **observability**

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod machine;
pub mod observability;
pub mod outcome;
pub mod ports;
pub mod store;

pub use self::app::{Orchestrator, Pipeline, PipelineBuilder, PipelineService, RunMode};
pub use self::config::PipelineConfig;
pub use self::error::PipelineError;
