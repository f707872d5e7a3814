//! Orchestration for a single supervisor/coder cycle.
//!
//! A cycle picks the first pending task and drives it through
//! guard → plan → veto → code → extract → execute → review, then commits
//! exactly one state transition (or none, when no code could be extracted).
//! Configuration and task state are reloaded from disk on every cycle so edits
//! made between cycles take effect without a restart.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::extract::extract_code;
use crate::core::guard::ArchitecturalGuard;
use crate::core::review::parse_review;
use crate::core::selector::{first_pending, retries_exhausted};
use crate::core::transition::{Transition, TransitionSummary};
use crate::io::config::{LoopConfig, RoleConfig, load_loop_config, load_role_config};
use crate::io::cycle_log::{CycleMeta, CycleRecord, CycleWriteRequest, write_cycle};
use crate::io::gateway::{ModelGateway, ModelRequest};
use crate::io::init::LoopPaths;
use crate::io::prompt::{PromptEngine, ReviewInputs};
use crate::io::sandbox::{ExecRequest, Sandbox};
use crate::io::task_store::{commit_transition, load_state};
use crate::task::{ProjectState, Task};

/// Everything a cycle reads from disk before it starts.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub paths: LoopPaths,
    pub config: LoopConfig,
    pub supervisor: RoleConfig,
    pub coder: RoleConfig,
    pub state: ProjectState,
}

impl CycleContext {
    /// Load configs and task state for `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let paths = LoopPaths::new(root);
        let config = load_loop_config(&paths.config_path)?;
        let supervisor =
            load_role_config(&paths.supervisor_path).context("load supervisor role")?;
        let coder = load_role_config(&paths.coder_path).context("load coder role")?;
        let state = load_state(&paths.state_path)?;
        Ok(Self {
            paths,
            config,
            supervisor,
            coder,
            state,
        })
    }

    fn commit(&mut self, task_id: &str, transition: &Transition) -> Result<TransitionSummary> {
        commit_transition(
            &self.paths.state_path,
            &mut self.state,
            task_id,
            transition,
            self.config.max_retries,
        )
    }

    fn skip_reason(&self, task_id: &str) -> String {
        self.state
            .find(task_id)
            .and_then(|task| task.skip_reason.clone())
            .unwrap_or_default()
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No pending task; nothing was called.
    Idle,
    /// The task was skipped by a guard or an exhausted retry budget set before this cycle.
    Skipped { task_id: String, reason: String },
    /// The coder reply held no code; the task is unchanged.
    NoCode { task_id: String },
    /// The review accepted the result.
    Completed { task_id: String },
    /// The review asked for changes; the task stays pending.
    Retrying { task_id: String, retries: u32 },
    /// The review asked for changes and the retry limit was reached.
    RetryLimit { task_id: String, retries: u32 },
}

impl CycleOutcome {
    /// Stable snake_case label for journals and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Idle => "idle",
            CycleOutcome::Skipped { .. } => "skipped",
            CycleOutcome::NoCode { .. } => "no_code",
            CycleOutcome::Completed { .. } => "completed",
            CycleOutcome::Retrying { .. } => "retrying",
            CycleOutcome::RetryLimit { .. } => "retry_limit",
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            CycleOutcome::Idle => None,
            CycleOutcome::Skipped { task_id, .. }
            | CycleOutcome::NoCode { task_id }
            | CycleOutcome::Completed { task_id }
            | CycleOutcome::Retrying { task_id, .. }
            | CycleOutcome::RetryLimit { task_id, .. } => Some(task_id),
        }
    }

    pub fn retries(&self) -> Option<u32> {
        match self {
            CycleOutcome::Retrying { retries, .. } | CycleOutcome::RetryLimit { retries, .. } => {
                Some(*retries)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Idle => write!(f, "idle"),
            CycleOutcome::Skipped { task_id, reason } => write!(f, "skipped {task_id}: {reason}"),
            CycleOutcome::NoCode { task_id } => write!(f, "no_code {task_id}"),
            CycleOutcome::Completed { task_id } => write!(f, "completed {task_id}"),
            CycleOutcome::Retrying { task_id, retries } => {
                write!(f, "retrying {task_id} (retries={retries})")
            }
            CycleOutcome::RetryLimit { task_id, retries } => {
                write!(f, "retry_limit {task_id} (retries={retries})")
            }
        }
    }
}

/// Run one cycle against the project at `root`.
///
/// Returns `Idle` without touching the gateway or sandbox when no task is
/// pending. Every cycle that selects a task leaves a journal entry under
/// `.metaloop/cycles/`, including cycles aborted by an error.
pub fn run_cycle<G: ModelGateway, S: Sandbox>(
    root: &Path,
    gateway: &G,
    sandbox: &S,
) -> Result<CycleOutcome> {
    let start = Instant::now();
    let started_at = Utc::now();
    let mut ctx = CycleContext::load(root)?;

    let Some(task) = first_pending(&ctx.state.tasks).cloned() else {
        info!("no pending tasks");
        return Ok(CycleOutcome::Idle);
    };
    let cycle_id = Uuid::now_v7().to_string();
    info!(task_id = %task.id, goal = %task.goal, cycle_id = %cycle_id, "selected task");

    let mut record = CycleRecord::default();
    let attempt = drive_task(&mut ctx, &task, gateway, sandbox, &mut record);

    let (label, retries) = match &attempt {
        Ok(outcome) => (outcome.label(), outcome.retries()),
        Err(err) => {
            record.error = Some(format!("{err:#}\n"));
            ("error", None)
        }
    };
    let meta = CycleMeta {
        cycle_id,
        task_id: task.id.clone(),
        outcome: label.to_string(),
        retries,
        started_at: started_at.to_rfc3339(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    let journal = write_cycle(&CycleWriteRequest {
        cycles_dir: &ctx.paths.cycles_dir,
        meta: &meta,
        record: &record,
        code_extension: &ctx.config.sandbox.extension,
    });

    let outcome = match attempt {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Err(journal_err) = journal {
                warn!(err = %journal_err, "failed to journal aborted cycle");
            }
            return Err(err);
        }
    };
    let paths = journal?;
    debug!(dir = %paths.dir.display(), "cycle journaled");
    info!(outcome = %outcome, duration_ms = meta.duration_ms, "cycle finished");
    Ok(outcome)
}

fn drive_task<G: ModelGateway, S: Sandbox>(
    ctx: &mut CycleContext,
    task: &Task,
    gateway: &G,
    sandbox: &S,
    record: &mut CycleRecord,
) -> Result<CycleOutcome> {
    let task_id = task.id.as_str();

    if retries_exhausted(task, ctx.config.max_retries) {
        warn!(task_id, retries = task.retries, "retry limit already reached");
        let summary = ctx.commit(task_id, &Transition::SkipRetryLimit)?;
        return Ok(CycleOutcome::RetryLimit {
            task_id: task_id.to_string(),
            retries: summary.retries,
        });
    }

    let guard = ArchitecturalGuard::new(
        &ctx.config.guard.trigger_phrases,
        ctx.config.guard.veto_sentinel.clone(),
    );
    if let Some(phrase) = guard.static_trigger(&task.goal) {
        warn!(task_id, phrase, "goal matches architectural trigger, skipping");
        let transition = Transition::SkipGuard {
            phrase: phrase.to_string(),
        };
        ctx.commit(task_id, &transition)?;
        return Ok(skipped(ctx, task_id));
    }

    let prompts = PromptEngine::new();
    let model_timeout = ctx.config.model_timeout();

    let feedback = if ctx.config.replay_feedback {
        task.feedback.as_deref()
    } else {
        None
    };
    let plan_prompt = prompts.render_plan(&task.goal, feedback)?;
    let plan = gateway
        .generate(
            &ModelRequest::new(
                &ctx.supervisor.model,
                &ctx.supervisor.system_prompt,
                plan_prompt,
            )
            .with_timeout(model_timeout),
        )
        .context("supervisor planning")?;
    info!(task_id, chars = plan.chars().count(), "supervisor plan received");
    debug!(plan = %plan);
    record.plan = Some(plan.clone());

    if guard.plan_vetoed(&plan) {
        warn!(task_id, sentinel = guard.veto_sentinel(), "supervisor vetoed task");
        ctx.commit(task_id, &Transition::SkipVeto)?;
        return Ok(skipped(ctx, task_id));
    }

    let coder_output = gateway
        .generate(
            &ModelRequest::new(&ctx.coder.model, &ctx.coder.system_prompt, plan.as_str())
                .with_timeout(model_timeout),
        )
        .context("coder step")?;
    info!(task_id, chars = coder_output.chars().count(), "coder output received");
    debug!(coder_output = %coder_output);
    record.coder_output = Some(coder_output.clone());

    let Some(code) = extract_code(&coder_output) else {
        warn!(task_id, "no code found in coder output, task left pending");
        return Ok(CycleOutcome::NoCode {
            task_id: task_id.to_string(),
        });
    };
    record.code = Some(code.clone());

    let execution = sandbox.execute(&ExecRequest {
        code,
        work_dir: ctx.paths.work_dir(&ctx.config),
        interpreter: ctx.config.sandbox.interpreter.clone(),
        extension: ctx.config.sandbox.extension.clone(),
        timeout: ctx.config.exec_timeout(),
    })?;
    info!(
        task_id,
        outcome = ?execution.outcome,
        chars = execution.output.chars().count(),
        "execution finished"
    );
    debug!(output = %execution.output);
    record.execution = Some(execution.output.clone());

    let review_prompt = prompts.render_review(&ReviewInputs {
        goal: &task.goal,
        coder_output: &coder_output,
        execution_result: &execution.output,
    })?;
    let review = gateway
        .generate(
            &ModelRequest::new(
                &ctx.supervisor.model,
                &ctx.supervisor.system_prompt,
                review_prompt,
            )
            .with_timeout(model_timeout),
        )
        .context("supervisor review")?;
    debug!(review = %review);
    record.review = Some(review.clone());

    let verdict = parse_review(&review);
    info!(task_id, verdict = ?verdict, "review parsed");
    let transition = match verdict.feedback() {
        None => Transition::Complete {
            result: execution.output,
            at: Utc::now(),
        },
        Some(feedback) => Transition::Improve {
            result: execution.output,
            feedback,
        },
    };
    let summary = ctx.commit(task_id, &transition)?;

    let task_id = task_id.to_string();
    let outcome = match &transition {
        Transition::Complete { .. } => CycleOutcome::Completed { task_id },
        Transition::Improve { .. } if summary.hit_retry_limit(&transition) => {
            CycleOutcome::RetryLimit {
                task_id,
                retries: summary.retries,
            }
        }
        Transition::Improve { .. } => CycleOutcome::Retrying {
            task_id,
            retries: summary.retries,
        },
        other => return Err(anyhow!("unexpected review transition {other:?}")),
    };
    Ok(outcome)
}

fn skipped(ctx: &CycleContext, task_id: &str) -> CycleOutcome {
    CycleOutcome::Skipped {
        task_id: task_id.to_string(),
        reason: ctx.skip_reason(task_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transition::RETRY_LIMIT_REASON;
    use crate::io::config::write_loop_config;
    use crate::task::TaskStatus;
    use crate::test_support::{ScriptedGateway, ScriptedSandbox, TestProject};

    #[test]
    fn idle_queue_makes_no_calls() {
        let project = TestProject::new().expect("project");
        let gateway = ScriptedGateway::new(Vec::<&str>::new());
        let sandbox = ScriptedSandbox::new(Vec::<&str>::new());

        let outcome = run_cycle(project.root(), &gateway, &sandbox).expect("cycle");

        assert_eq!(outcome, CycleOutcome::Idle);
        assert!(gateway.requests().is_empty());
        assert_eq!(sandbox.calls(), 0);
        assert!(!project.paths().cycles_dir.exists());
    }

    #[test]
    fn exhausted_task_is_skipped_without_calls() {
        let project = TestProject::new().expect("project");
        project.add("t1", "Reverse a string").expect("add");
        let mut state = project.state().expect("state");
        state.tasks[0].retries = 3;
        project.write_state(&state).expect("write state");
        write_loop_config(
            &project.paths().config_path,
            &LoopConfig {
                max_retries: Some(2),
                ..LoopConfig::default()
            },
        )
        .expect("config");

        let gateway = ScriptedGateway::new(Vec::<&str>::new());
        let sandbox = ScriptedSandbox::new(Vec::<&str>::new());
        let outcome = run_cycle(project.root(), &gateway, &sandbox).expect("cycle");

        assert_eq!(
            outcome,
            CycleOutcome::RetryLimit {
                task_id: "t1".to_string(),
                retries: 3,
            }
        );
        assert!(gateway.requests().is_empty());
        let task = project.task("t1").expect("task");
        assert_eq!(task.status, TaskStatus::Skipped);
        assert_eq!(task.skip_reason.as_deref(), Some(RETRY_LIMIT_REASON));
    }

    #[test]
    fn gateway_error_propagates_and_is_journaled() {
        let project = TestProject::new().expect("project");
        project.add("t1", "Reverse a string").expect("add");
        let gateway = ScriptedGateway::new(Vec::<&str>::new());
        let sandbox = ScriptedSandbox::new(Vec::<&str>::new());

        let err = run_cycle(project.root(), &gateway, &sandbox).unwrap_err();

        assert!(format!("{err:#}").contains("supervisor planning"));
        assert_eq!(project.task("t1").expect("task").status, TaskStatus::Pending);
        let entries: Vec<_> = std::fs::read_dir(&project.paths().cycles_dir)
            .expect("cycles dir")
            .collect();
        assert_eq!(entries.len(), 1);
        let dir = entries[0].as_ref().expect("entry").path();
        assert!(dir.join("error.log").is_file());
    }

    #[test]
    fn outcome_display_is_compact() {
        let outcome = CycleOutcome::Retrying {
            task_id: "t1".to_string(),
            retries: 2,
        };
        assert_eq!(outcome.to_string(), "retrying t1 (retries=2)");
        assert_eq!(outcome.label(), "retrying");
        assert_eq!(outcome.task_id(), Some("t1"));
        assert_eq!(CycleOutcome::Idle.task_id(), None);
    }
}
