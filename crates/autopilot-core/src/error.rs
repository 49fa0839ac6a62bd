//! Errors - エラー型と分類
//!
//! シミュレーション上の「タスク失敗」はエラーではなく、ステータスとして報告されます。
//! ここで扱うのはシステム自身のエラーのみです。

use thiserror::Error;

/// ErrorKind はエラーの運用分類
///
/// - NotFound / BadRequest: 呼び出し側が回復可能（型付きの結果として返す）
/// - Internal: 不変条件違反（そのタスクの実行だけを止める）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Internal,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn task_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "task",
            id: id.to_string(),
        }
    }

    pub fn batch_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "batch",
            id: id.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotFound { .. } => ErrorKind::NotFound,
            PipelineError::BadRequest(_) => ErrorKind::BadRequest,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }
}
