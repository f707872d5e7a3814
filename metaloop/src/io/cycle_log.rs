//! Cycle journal under `.metaloop/cycles/`.
//!
//! Journal files are diagnostics for operators. The task store stays the
//! source of truth.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CycleMeta {
    pub cycle_id: String,
    pub task_id: String,
    pub outcome: String,
    pub retries: Option<u32>,
    pub started_at: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CyclePaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub plan_path: PathBuf,
    pub coder_path: PathBuf,
    pub execution_path: PathBuf,
    pub review_path: PathBuf,
    pub error_path: PathBuf,
}

impl CyclePaths {
    pub fn new(cycles_dir: &Path, cycle_id: &str) -> Self {
        let dir = cycles_dir.join(cycle_id);
        Self {
            dir: dir.clone(),
            meta_path: dir.join("meta.json"),
            plan_path: dir.join("plan.md"),
            coder_path: dir.join("coder.md"),
            execution_path: dir.join("execution.log"),
            review_path: dir.join("review.md"),
            error_path: dir.join("error.log"),
        }
    }

    pub fn code_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("code.{}", extension.trim_start_matches('.')))
    }
}

/// Everything a cycle produced, in pipeline order.
#[derive(Debug, Default)]
pub struct CycleRecord {
    pub plan: Option<String>,
    pub coder_output: Option<String>,
    pub code: Option<String>,
    pub execution: Option<String>,
    pub review: Option<String>,
    /// Error that aborted the cycle, if any.
    pub error: Option<String>,
}

pub struct CycleWriteRequest<'a> {
    pub cycles_dir: &'a Path,
    pub meta: &'a CycleMeta,
    pub record: &'a CycleRecord,
    pub code_extension: &'a str,
}

pub fn write_cycle(request: &CycleWriteRequest<'_>) -> Result<CyclePaths> {
    let paths = CyclePaths::new(request.cycles_dir, &request.meta.cycle_id);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create cycle dir {}", paths.dir.display()))?;

    write_json(&paths.meta_path, request.meta)?;
    let record = request.record;
    write_optional(&paths.plan_path, record.plan.as_deref())?;
    write_optional(&paths.coder_path, record.coder_output.as_deref())?;
    write_optional(
        &paths.code_path(request.code_extension),
        record.code.as_deref(),
    )?;
    write_optional(&paths.execution_path, record.execution.as_deref())?;
    write_optional(&paths.review_path, record.review.as_deref())?;
    write_optional(&paths.error_path, record.error.as_deref())?;

    Ok(paths)
}

fn write_optional(path: &Path, contents: Option<&str>) -> Result<()> {
    match contents {
        Some(text) => write_text(path, text),
        None => Ok(()),
    }
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    write_text(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(outcome: &str) -> CycleMeta {
        CycleMeta {
            cycle_id: "cycle-1".to_string(),
            task_id: "t1".to_string(),
            outcome: outcome.to_string(),
            retries: None,
            started_at: "2026-01-01T00:00:00Z".to_string(),
            duration_ms: 5,
        }
    }

    #[test]
    fn cycle_paths_are_stable() {
        let paths = CyclePaths::new(Path::new("/p/.metaloop/cycles"), "abc");
        assert!(paths.dir.ends_with("cycles/abc"));
        assert!(paths.meta_path.ends_with("meta.json"));
        assert!(paths.code_path(".py").ends_with("code.py"));
    }

    #[test]
    fn writes_only_produced_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = meta("no_code");
        let record = CycleRecord {
            plan: Some("1. think".to_string()),
            coder_output: Some("no code here".to_string()),
            ..CycleRecord::default()
        };

        let paths = write_cycle(&CycleWriteRequest {
            cycles_dir: temp.path(),
            meta: &meta,
            record: &record,
            code_extension: "py",
        })
        .expect("write cycle");

        assert!(paths.meta_path.is_file());
        assert!(paths.plan_path.is_file());
        assert!(paths.coder_path.is_file());
        assert!(!paths.code_path("py").exists());
        assert!(!paths.execution_path.exists());
        assert!(!paths.review_path.exists());
        assert!(!paths.error_path.exists());

        let meta_json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.meta_path).expect("read"))
                .expect("parse");
        assert_eq!(meta_json["outcome"], "no_code");
    }
}
