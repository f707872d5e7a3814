//! Selection helper for `metaloop select`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::selector::first_pending;
use crate::io::init::LoopPaths;
use crate::io::task_store::load_state;
use crate::task::ProjectState;

/// Structured selection outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// No pending task.
    Idle,
    /// Next task a cycle would work on.
    Pending(SelectedTask),
}

/// Minimal selected task metadata for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTask {
    pub id: String,
    pub goal: String,
    pub retries: u32,
}

pub fn select_task(state: &ProjectState) -> SelectOutcome {
    match first_pending(&state.tasks) {
        Some(task) => SelectOutcome::Pending(SelectedTask {
            id: task.id.clone(),
            goal: task.goal.clone(),
            retries: task.retries,
        }),
        None => SelectOutcome::Idle,
    }
}

/// Load the task store under `root` and select the next task.
pub fn select_from_root(root: &Path) -> Result<SelectOutcome> {
    let paths = LoopPaths::new(root);
    let state = load_state(&paths.state_path).context("load state for selection")?;
    Ok(select_task(&state))
}
