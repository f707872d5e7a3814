//! Initialization helpers for `.metaloop/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use super::config::{LoopConfig, RoleConfig, write_loop_config, write_role_config};
use super::task_store::write_state;
use crate::task::default_state;

const DEFAULT_SUPERVISOR_PROMPT: &str = "You are the supervisor of an autonomous coding loop. \
Turn the task into a short, concrete plan a coder can implement as one self-contained script. \
If the task needs a structural or framework-level change, reply with ARCHITECT_REQUIRED instead.";

const DEFAULT_CODER_PROMPT: &str = "You are a coder. Implement the plan as a single runnable \
Python script inside one ```python fenced block. Print the result.";

/// All canonical paths within `.metaloop/` for a project root.
#[derive(Debug, Clone)]
pub struct LoopPaths {
    pub root: PathBuf,
    pub loop_dir: PathBuf,
    pub state_dir: PathBuf,
    pub cycles_dir: PathBuf,
    pub supervisor_path: PathBuf,
    pub coder_path: PathBuf,
    pub config_path: PathBuf,
    pub state_path: PathBuf,
}

impl LoopPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let loop_dir = root.join(".metaloop");
        let state_dir = loop_dir.join("state");
        Self {
            root: root.clone(),
            loop_dir: loop_dir.clone(),
            state_dir: state_dir.clone(),
            cycles_dir: loop_dir.join("cycles"),
            supervisor_path: loop_dir.join("supervisor.toml"),
            coder_path: loop_dir.join("coder.toml"),
            config_path: loop_dir.join("loop.toml"),
            state_path: state_dir.join("project_state.json"),
        }
    }

    /// Resolve the sandbox work directory (relative paths hang off the root).
    pub fn work_dir(&self, cfg: &LoopConfig) -> PathBuf {
        if cfg.sandbox.work_dir.is_absolute() {
            cfg.sandbox.work_dir.clone()
        } else {
            self.root.join(&cfg.sandbox.work_dir)
        }
    }
}

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing files.
    pub force: bool,
    /// Model used for both roles in the scaffolded configs.
    pub model: String,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            force: false,
            model: "llama3.2".to_string(),
        }
    }
}

/// Create `.metaloop/` with role configs, loop config, and an empty task queue.
///
/// Existing files are kept unless `force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<LoopPaths> {
    if options.model.trim().is_empty() {
        return Err(anyhow!("model must not be empty"));
    }
    let paths = LoopPaths::new(root);
    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create {}", paths.state_dir.display()))?;

    if should_write(&paths.supervisor_path, options.force) {
        write_role_config(
            &paths.supervisor_path,
            &RoleConfig {
                model: options.model.clone(),
                system_prompt: DEFAULT_SUPERVISOR_PROMPT.to_string(),
            },
        )?;
    }
    if should_write(&paths.coder_path, options.force) {
        write_role_config(
            &paths.coder_path,
            &RoleConfig {
                model: options.model.clone(),
                system_prompt: DEFAULT_CODER_PROMPT.to_string(),
            },
        )?;
    }
    if should_write(&paths.config_path, options.force) {
        write_loop_config(&paths.config_path, &LoopConfig::default())?;
    }
    if should_write(&paths.state_path, options.force) {
        write_state(&paths.state_path, &default_state())?;
    }

    info!(root = %root.display(), "initialized .metaloop");
    Ok(paths)
}

fn should_write(path: &Path, force: bool) -> bool {
    let write = force || !path.exists();
    if !write {
        debug!(path = %path.display(), "keeping existing file");
    }
    write
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::{load_loop_config, load_role_config};
    use crate::io::task_store::load_state;

    #[test]
    fn init_creates_loadable_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_project(temp.path(), &InitOptions::default()).expect("init");

        let supervisor = load_role_config(&paths.supervisor_path).expect("supervisor");
        assert_eq!(supervisor.model, "llama3.2");
        assert!(supervisor.system_prompt.contains("ARCHITECT_REQUIRED"));
        load_role_config(&paths.coder_path).expect("coder");
        assert_eq!(
            load_loop_config(&paths.config_path).expect("loop config"),
            LoopConfig::default()
        );
        assert!(load_state(&paths.state_path).expect("state").tasks.is_empty());
    }

    #[test]
    fn init_keeps_existing_files_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_project(temp.path(), &InitOptions::default()).expect("init");
        fs::write(&paths.coder_path, "model = \"custom\"\n").expect("write");

        init_project(temp.path(), &InitOptions::default()).expect("re-init");
        assert_eq!(load_role_config(&paths.coder_path).expect("coder").model, "custom");

        init_project(
            temp.path(),
            &InitOptions {
                force: true,
                ..InitOptions::default()
            },
        )
        .expect("force init");
        assert_eq!(load_role_config(&paths.coder_path).expect("coder").model, "llama3.2");
    }

    #[test]
    fn relative_work_dir_resolves_under_root() {
        let paths = LoopPaths::new("/project");
        let cfg = LoopConfig::default();
        assert_eq!(paths.work_dir(&cfg), PathBuf::from("/project/.metaloop/generated"));
    }
}
