//! Read-only views for polling clients.

use serde::{Deserialize, Serialize};

use crate::domain::TaskStatus;

/// Number of tasks per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: usize,
    pub not_ready: usize,
    pub processing: usize,
    pub review_required: usize,
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: TaskStatus) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::NotReady => self.not_ready,
            TaskStatus::Processing => self.processing,
            TaskStatus::ReviewRequired => self.review_required,
            TaskStatus::Retrying => self.retrying,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Rejected => self.rejected,
        }
    }

    pub fn total(&self) -> usize {
        TaskStatus::ALL.into_iter().map(|status| self.get(status)).sum()
    }

    fn slot(&mut self, status: TaskStatus) -> &mut usize {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::NotReady => &mut self.not_ready,
            TaskStatus::Processing => &mut self.processing,
            TaskStatus::ReviewRequired => &mut self.review_required,
            TaskStatus::Retrying => &mut self.retrying,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
            TaskStatus::Rejected => &mut self.rejected,
        }
    }
}

impl FromIterator<TaskStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = TaskStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

/// Progress of the current (or last) orchestrator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_status() {
        let counts: StatusCounts = [
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Completed,
            TaskStatus::ReviewRequired,
        ]
        .into_iter()
        .collect();

        assert_eq!(counts.completed, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.get(TaskStatus::ReviewRequired), 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn progress_serializes_camel_case() {
        let json = serde_json::to_value(Progress {
            completed: 3,
            total: 10,
            running: true,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"completed": 3, "total": 10, "running": true}));
    }
}
