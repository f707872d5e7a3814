//! Sandboxed executor for generated code.
//!
//! The [`Sandbox`] trait decouples the cycle controller from the execution
//! backend. [`ScriptSandbox`] writes the code to a uniquely named script and
//! runs it under a wall-clock timeout. It trusts the code: there is no
//! filesystem, network, CPU, or memory isolation beyond the timeout. Tests use
//! scripted sandboxes that return predetermined results without spawning.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::io::process::{ChildExit, run_with_timeout};

/// How an execution ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExecOutcome {
    Exited { code: Option<i32> },
    TimedOut,
    LaunchFailed,
}

/// Result of running generated code. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Stdout followed by stderr, or the failure reason.
    pub output: String,
    pub outcome: ExecOutcome,
    /// Script that was executed, when one was written.
    pub script_path: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.outcome == ExecOutcome::Exited { code: Some(0) }
    }
}

/// Parameters for one execution.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Code to persist and run.
    pub code: String,
    /// Directory that receives the script and serves as the child's working directory.
    pub work_dir: PathBuf,
    /// Command prefix; the script file name is appended as the last argument.
    pub interpreter: Vec<String>,
    /// Script file extension.
    pub extension: String,
    /// Wall-clock limit after which the child is killed.
    pub timeout: Duration,
}

impl ExecRequest {
    /// Fresh script path. UUID v7 is time-ordered and monotonic within the process.
    pub fn script_path(&self) -> PathBuf {
        let name = format!(
            "generated_{}.{}",
            Uuid::now_v7().simple(),
            self.extension.trim_start_matches('.')
        );
        self.work_dir.join(name)
    }
}

/// Abstraction over code execution backends.
pub trait Sandbox {
    /// Run the request. Only failures to persist the script are `Err`.
    fn execute(&self, request: &ExecRequest) -> Result<ExecutionResult>;
}

/// Sandbox that writes a script file and runs it with an interpreter.
pub struct ScriptSandbox;

impl Sandbox for ScriptSandbox {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs(), code_len = request.code.len()))]
    fn execute(&self, request: &ExecRequest) -> Result<ExecutionResult> {
        fs::create_dir_all(&request.work_dir)
            .with_context(|| format!("create work dir {}", request.work_dir.display()))?;
        let script_path = request.script_path();
        fs::write(&script_path, &request.code)
            .with_context(|| format!("write script {}", script_path.display()))?;
        info!(
            script = %script_path.display(),
            chars = request.code.chars().count(),
            "saved generated code"
        );

        let Some((program, args)) = request.interpreter.split_first() else {
            return Ok(ExecutionResult {
                output: "no interpreter configured".to_string(),
                outcome: ExecOutcome::LaunchFailed,
                script_path: Some(script_path),
            });
        };
        // The child runs inside the work dir, so pass the bare file name.
        let file_name = script_path.file_name().unwrap_or(script_path.as_os_str());
        let mut cmd = Command::new(program);
        cmd.args(args).arg(file_name).current_dir(&request.work_dir);

        let timeout = request.timeout;
        let result = match run_with_timeout(cmd, timeout) {
            Ok(capture) => match capture.exit {
                ChildExit::TimedOut => {
                    warn!(timeout_secs = timeout.as_secs(), "generated code timed out");
                    ExecutionResult {
                        output: format!("execution timed out after {}s", timeout.as_secs()),
                        outcome: ExecOutcome::TimedOut,
                        script_path: Some(script_path),
                    }
                }
                ChildExit::Status(status) => ExecutionResult {
                    output: capture.combined(),
                    outcome: ExecOutcome::Exited {
                        code: status.code(),
                    },
                    script_path: Some(script_path),
                },
            },
            Err(err) => {
                warn!(err = %err, "failed to launch generated code");
                ExecutionResult {
                    output: format!("{err:#}"),
                    outcome: ExecOutcome::LaunchFailed,
                    script_path: Some(script_path),
                }
            }
        };

        debug!(outcome = ?result.outcome, output_len = result.output.len(), "execution finished");
        Ok(result)
    }
}
