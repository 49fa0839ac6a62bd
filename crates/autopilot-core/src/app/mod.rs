//! App - アプリケーション層
//!
//! store・generator・ports を組み合わせてパイプラインを動かします。
//!
//! # 主要コンポーネント
//! - **PipelineBuilder**: 設定の検証とワイヤリング
//! - **PipelineService**: アクション適用の境界（RPC 相当）
//! - **Orchestrator**: 同時実行数を制限した run の駆動
//! - **worker_loop**: 1 タスクの lifecycle（start → steps → terminal）

pub mod builder;
pub mod orchestrator;
pub mod service;
mod worker_loop;

pub use self::builder::{Pipeline, PipelineBuilder};
pub use self::orchestrator::{Orchestrator, RunMode};
pub use self::service::PipelineService;
