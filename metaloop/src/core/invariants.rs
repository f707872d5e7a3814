//! Semantic invariants not expressible via JSON Schema.

use std::collections::HashSet;

use crate::task::{ProjectState, TaskStatus};

/// Check semantic invariants of the project state:
/// - Task ids are non-blank and unique
/// - `completed_at` is only set on `done` tasks
pub fn validate_invariants(state: &ProjectState) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, task) in state.tasks.iter().enumerate() {
        if task.id.trim().is_empty() {
            errors.push(format!("tasks[{index}]: id must not be blank"));
            continue;
        }
        if !seen.insert(task.id.as_str()) {
            errors.push(format!("duplicate id '{}' at tasks[{index}]", task.id));
        }
        if task.completed_at.is_some() && task.status != TaskStatus::Done {
            errors.push(format!(
                "{}: completed_at set but status is {}",
                task.id,
                task.status.as_str()
            ));
        }
    }

    errors
}
