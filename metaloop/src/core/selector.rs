//! Deterministic selection logic for the task queue.

use crate::task::{Task, TaskStatus};

/// Find the first `pending` task in declaration order.
///
/// Returns `None` if every task is `done` or `skipped` (queue is idle).
pub fn first_pending(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().find(|task| task.status == TaskStatus::Pending)
}

/// Returns true if a pending task has used up its retry allowance.
///
/// `None` means retries are unbounded.
pub fn retries_exhausted(task: &Task, max_retries: Option<u32>) -> bool {
    match max_retries {
        Some(limit) => task.status == TaskStatus::Pending && task.retries >= limit,
        None => false,
    }
}
