//! Controller-owned state transitions for the task queue.

use chrono::{DateTime, Utc};

use crate::task::{ProjectState, TaskStatus};

pub const RETRY_LIMIT_REASON: &str = "retry limit reached";
pub const VETO_REASON: &str = "architect intervention required";

/// A status-affecting outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Static guard matched a trigger phrase in the goal.
    SkipGuard { phrase: String },
    /// Supervisor plan carried the veto sentinel.
    SkipVeto,
    /// Selected task already used up its retries (the limit was lowered).
    SkipRetryLimit,
    /// Review accepted the execution result.
    Complete { result: String, at: DateTime<Utc> },
    /// Review asked for changes (or was unrecognized).
    Improve { result: String, feedback: String },
}

/// Summary of what `apply_transition` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionSummary {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub retries: u32,
}

impl TransitionSummary {
    /// True when the transition skipped the task for exceeding the retry limit.
    pub fn hit_retry_limit(&self, transition: &Transition) -> bool {
        match transition {
            Transition::Improve { .. } => self.to == TaskStatus::Skipped,
            Transition::SkipRetryLimit => true,
            _ => false,
        }
    }
}

/// Apply `transition` to the task `task_id`.
///
/// Only `pending` tasks may transition; terminal tasks are never revisited.
pub fn apply_transition(
    state: &mut ProjectState,
    task_id: &str,
    transition: &Transition,
    max_retries: Option<u32>,
) -> Result<TransitionSummary, String> {
    let task = state
        .find_mut(task_id)
        .ok_or_else(|| format!("task '{task_id}' not found"))?;
    let from = task.status;
    if from.is_terminal() {
        return Err(format!(
            "task '{task_id}' is {} and cannot transition",
            from.as_str()
        ));
    }

    match transition {
        Transition::SkipGuard { phrase } => {
            task.status = TaskStatus::Skipped;
            task.skip_reason = Some(format!("architectural trigger phrase '{phrase}'"));
        }
        Transition::SkipVeto => {
            task.status = TaskStatus::Skipped;
            task.skip_reason = Some(VETO_REASON.to_string());
        }
        Transition::SkipRetryLimit => {
            task.status = TaskStatus::Skipped;
            task.skip_reason = Some(RETRY_LIMIT_REASON.to_string());
        }
        Transition::Complete { result, at } => {
            task.status = TaskStatus::Done;
            task.last_result = Some(result.clone());
            task.completed_at = Some(*at);
            task.feedback = None;
        }
        Transition::Improve { result, feedback } => {
            task.retries = task.retries.saturating_add(1);
            task.last_result = Some(result.clone());
            task.feedback = Some(feedback.clone());
            if max_retries.is_some_and(|limit| task.retries >= limit) {
                task.status = TaskStatus::Skipped;
                task.skip_reason = Some(RETRY_LIMIT_REASON.to_string());
            }
        }
    }

    Ok(TransitionSummary {
        task_id: task.id.clone(),
        from,
        to: task.status,
        retries: task.retries,
    })
}
