//! Paginated task listing.

use serde::{Deserialize, Serialize};

use crate::domain::{BatchId, Task, TaskStatus};
use crate::observability::StatusCounts;

pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub batch_id: Option<BatchId>,
    pub status: Option<TaskStatus>,
    /// 1-based.
    pub page: usize,
    pub size: usize,
}

impl TaskQuery {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            batch_id: None,
            status: None,
            page,
            size,
        }
    }

    pub fn batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Page at least 1, size within `1..=MAX_PAGE_SIZE`.
    pub fn normalized(&self) -> (usize, usize) {
        (self.page.max(1), self.size.clamp(1, MAX_PAGE_SIZE))
    }
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    /// Matching tasks before pagination.
    pub total_count: usize,
    /// Per-status counts of the batch (or the whole store), ignoring the status filter.
    pub count_by_status: StatusCounts,
    pub page: usize,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero_page(0, 10, (1, 10))]
    #[case::zero_size(2, 0, (2, 1))]
    #[case::oversized(1, 500, (1, MAX_PAGE_SIZE))]
    fn normalizes_page_and_size(
        #[case] page: usize,
        #[case] size: usize,
        #[case] expected: (usize, usize),
    ) {
        assert_eq!(TaskQuery::new(page, size).normalized(), expected);
    }
}
