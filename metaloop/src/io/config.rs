//! Role and loop configuration stored under `.metaloop/`.
//!
//! All files are TOML, intended to be edited by humans between cycles. They
//! are reloaded at the start of every cycle, so edits take effect on the next
//! iteration without a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::io::atomic::replace_file;

/// Model role configuration (`supervisor.toml`, `coder.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleConfig {
    /// Model identifier passed to the gateway.
    pub model: String,

    /// Prepended to every prompt sent for this role.
    #[serde(default)]
    pub system_prompt: String,
}

impl RoleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }
        Ok(())
    }
}

/// Loop configuration (`loop.toml`).
///
/// Missing fields fall back to [`LoopConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Fixed pause between cycles, whatever the outcome.
    pub sleep_secs: u64,

    /// Wall-clock budget for one execution of generated code.
    pub exec_timeout_secs: u64,

    /// Per-request budget for model calls. Unset waits indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_timeout_secs: Option<u64>,

    /// Retry count at which a task is skipped. Unset means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Feed the last reviewer instruction into the next planning prompt.
    pub replay_feedback: bool,

    pub guard: GuardConfig,

    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GuardConfig {
    /// Goal phrases (case-insensitive) that skip a task before any model call.
    pub trigger_phrases: Vec<String>,

    /// Plan text token with which the supervisor vetoes a task.
    pub veto_sentinel: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            trigger_phrases: vec!["framework".to_string(), "architecture".to_string()],
            veto_sentinel: "ARCHITECT_REQUIRED".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Command prefix; the script file name is appended as the last argument.
    pub interpreter: Vec<String>,

    /// Extension of generated script files.
    pub extension: String,

    /// Directory holding generated scripts (relative to the project root).
    pub work_dir: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: vec!["python3".to_string()],
            extension: "py".to_string(),
            work_dir: PathBuf::from(".metaloop/generated"),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            sleep_secs: 20,
            exec_timeout_secs: 20,
            model_timeout_secs: None,
            max_retries: None,
            replay_feedback: false,
            guard: GuardConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.exec_timeout_secs == 0 {
            return Err(anyhow!("exec_timeout_secs must be > 0"));
        }
        if self.model_timeout_secs == Some(0) {
            return Err(anyhow!("model_timeout_secs must be > 0 when set"));
        }
        if self.max_retries == Some(0) {
            return Err(anyhow!("max_retries must be > 0 when set"));
        }
        if self.guard.veto_sentinel.trim().is_empty() {
            return Err(anyhow!("guard.veto_sentinel must not be empty"));
        }
        if self.sandbox.interpreter.is_empty() || self.sandbox.interpreter[0].trim().is_empty() {
            return Err(anyhow!("sandbox.interpreter must be a non-empty array"));
        }
        if self.sandbox.extension.trim().is_empty() {
            return Err(anyhow!("sandbox.extension must not be empty"));
        }
        Ok(())
    }

    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout_secs.map(Duration::from_secs)
    }
}

/// Load a role config. A missing file is a configuration error.
pub fn load_role_config(path: &Path) -> Result<RoleConfig> {
    let cfg: RoleConfig = read_toml(path)?;
    cfg.validate()
        .with_context(|| format!("invalid role config {}", path.display()))?;
    Ok(cfg)
}

/// Load the loop config from a TOML file.
///
/// If the file is missing, returns `LoopConfig::default()`.
pub fn load_loop_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        let cfg = LoopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let cfg: LoopConfig = read_toml(path)?;
    cfg.validate()
        .with_context(|| format!("invalid loop config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write a role config to disk (temp file + rename).
pub fn write_role_config(path: &Path, cfg: &RoleConfig) -> Result<()> {
    cfg.validate()?;
    write_toml(path, cfg)
}

/// Atomically write the loop config to disk (temp file + rename).
pub fn write_loop_config(path: &Path, cfg: &LoopConfig) -> Result<()> {
    cfg.validate()?;
    write_toml(path, cfg)
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = toml::to_string_pretty(value).context("serialize config toml")?;
    buf.push('\n');
    replace_file(path, &buf)
}
