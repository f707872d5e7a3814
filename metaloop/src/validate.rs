//! Validation helpers for the `.metaloop/` layout.

use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::io::config::{load_loop_config, load_role_config};
use crate::io::init::LoopPaths;
use crate::io::task_store::{load_state, status_counts};
use crate::task::TaskStatus;

/// Task counts of a valid project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    /// Task count per status, in `pending, done, skipped` order.
    pub counts: [(TaskStatus, usize); 3],
}

impl ValidateOutcome {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.counts
            .iter()
            .find(|(candidate, _)| *candidate == status)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Validate `.metaloop/` layout, role configs, loop config, and the task store.
pub fn validate_project(root: &Path) -> Result<ValidateOutcome> {
    let paths = LoopPaths::new(root);

    for dir in [&paths.loop_dir, &paths.state_dir] {
        ensure(dir, Entry::Dir)?;
    }
    for file in [&paths.supervisor_path, &paths.coder_path, &paths.state_path] {
        ensure(file, Entry::File)?;
    }

    load_role_config(&paths.supervisor_path).context("load supervisor.toml")?;
    load_role_config(&paths.coder_path).context("load coder.toml")?;
    load_loop_config(&paths.config_path).context("load loop.toml")?;
    let state = load_state(&paths.state_path).context("load project_state.json")?;

    Ok(ValidateOutcome {
        counts: status_counts(&state),
    })
}

#[derive(Clone, Copy)]
enum Entry {
    Dir,
    File,
}

fn ensure(path: &Path, entry: Entry) -> Result<()> {
    let (present, noun) = match entry {
        Entry::Dir => (path.is_dir(), "directory"),
        Entry::File => (path.is_file(), "file"),
    };
    match (present, path.exists()) {
        (true, _) => Ok(()),
        (false, true) => Err(anyhow!("expected {noun} at {}", path.display())),
        (false, false) => Err(anyhow!("missing {noun} {}", path.display())),
    }
}
