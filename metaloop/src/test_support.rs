//! Test-only fixtures: task builders, scripted backends, and scratch projects.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Result, anyhow};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use crate::io::config::{LoopConfig, write_loop_config};
use crate::io::gateway::{ModelGateway, ModelRequest};
use crate::io::init::{InitOptions, LoopPaths, init_project};
use crate::io::sandbox::{ExecOutcome, ExecRequest, ExecutionResult, Sandbox};
use crate::io::task_store::{add_task, load_state, write_state};
use crate::task::{ProjectState, Task, TaskStatus};

/// Pending task with a goal derived from its id.
pub fn pending(id: &str) -> Task {
    Task::pending(id, format!("{id} goal"))
}

/// Done task with a fixed completion time.
pub fn done(id: &str) -> Task {
    Task {
        status: TaskStatus::Done,
        last_result: Some("ok".to_string()),
        completed_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single(),
        ..pending(id)
    }
}

pub fn skipped(id: &str) -> Task {
    Task {
        status: TaskStatus::Skipped,
        skip_reason: Some("test".to_string()),
        ..pending(id)
    }
}

pub fn state_with(tasks: Vec<Task>) -> ProjectState {
    ProjectState {
        tasks,
        ..ProjectState::default()
    }
}

/// Gateway that replays canned replies in order and records every request.
///
/// Returns an error once the replies run out.
pub struct ScriptedGateway {
    replies: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<ModelRequest>>,
}

impl ScriptedGateway {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.borrow().clone()
    }

    /// Models addressed so far, in call order.
    pub fn models(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.model.clone())
            .collect()
    }
}

impl ModelGateway for ScriptedGateway {
    fn generate(&self, request: &ModelRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted gateway has no reply for model '{}'", request.model))
    }
}

/// Sandbox that returns canned results without spawning anything.
pub struct ScriptedSandbox {
    results: RefCell<VecDeque<ExecutionResult>>,
    codes: RefCell<Vec<String>>,
    calls: Cell<usize>,
}

impl ScriptedSandbox {
    /// Each output becomes a successful execution result.
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(outputs.into_iter().map(|output| ExecutionResult {
            output: output.into(),
            outcome: ExecOutcome::Exited { code: Some(0) },
            script_path: None,
        }))
    }

    pub fn from_results(results: impl IntoIterator<Item = ExecutionResult>) -> Self {
        Self {
            results: RefCell::new(results.into_iter().collect()),
            codes: RefCell::new(Vec::new()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Code passed to each execution, in call order.
    pub fn codes(&self) -> Vec<String> {
        self.codes.borrow().clone()
    }
}

impl Sandbox for ScriptedSandbox {
    fn execute(&self, request: &ExecRequest) -> Result<ExecutionResult> {
        self.calls.set(self.calls.get() + 1);
        self.codes.borrow_mut().push(request.code.clone());
        self.results
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted sandbox has no result"))
    }
}

/// Scratch project with an initialized `.metaloop/` layout.
pub struct TestProject {
    temp: TempDir,
    paths: LoopPaths,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = init_project(temp.path(), &InitOptions::default())?;
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &LoopPaths {
        &self.paths
    }

    pub fn add(&self, id: &str, goal: &str) -> Result<Task> {
        add_task(&self.paths.state_path, id, goal)
    }

    pub fn state(&self) -> Result<ProjectState> {
        load_state(&self.paths.state_path)
    }

    pub fn write_state(&self, state: &ProjectState) -> Result<()> {
        write_state(&self.paths.state_path, state)
    }

    pub fn task(&self, id: &str) -> Result<Task> {
        self.state()?
            .find(id)
            .cloned()
            .ok_or_else(|| anyhow!("task '{id}' not found"))
    }

    pub fn write_config(&self, cfg: &LoopConfig) -> Result<()> {
        write_loop_config(&self.paths.config_path, cfg)
    }
}
