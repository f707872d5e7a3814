//! Project state load/save with schema + invariant validation.
//!
//! The store is read at the start of every cycle and rewritten at most once
//! per cycle. Writes replace the file atomically (temp file + rename), so a
//! crash after a commit never loses or tears the transition.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::invariants::validate_invariants;
use crate::core::transition::{Transition, TransitionSummary, apply_transition};
use crate::io::atomic::replace_file;
use crate::task::{ProjectState, Task, TaskStatus};

const STATE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/project_state.schema.json"
));

/// Load and validate the project state from disk (schema + invariants).
pub fn load_state(path: &Path) -> Result<ProjectState> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    validate_schema(&value).with_context(|| format!("validate state {}", path.display()))?;
    let tasks_position = value
        .as_object()
        .and_then(|doc| doc.keys().position(|key| key == "tasks"))
        .unwrap_or(0);
    let mut state: ProjectState = serde_json::from_value(value)
        .with_context(|| format!("deserialize state {}", path.display()))?;
    state.tasks_position = tasks_position;
    validate_state_invariants(&state)?;
    debug!(path = %path.display(), tasks = state.tasks.len(), "state loaded");
    Ok(state)
}

/// Atomically write the project state to disk, preserving task order.
pub fn write_state(path: &Path, state: &ProjectState) -> Result<()> {
    validate_state_invariants(state)?;
    let doc = state.to_document().context("serialize state json")?;
    let mut buf = serde_json::to_string_pretty(&doc).context("serialize state json")?;
    buf.push('\n');
    replace_file(path, &buf)
}

/// Apply `transition` to `task_id` and persist it before returning.
#[instrument(skip_all, fields(task_id = %task_id))]
pub fn commit_transition(
    path: &Path,
    state: &mut ProjectState,
    task_id: &str,
    transition: &Transition,
    max_retries: Option<u32>,
) -> Result<TransitionSummary> {
    let summary = apply_transition(state, task_id, transition, max_retries)
        .map_err(|err| anyhow!("state transition failed: {err}"))?;
    write_state(path, state)?;
    info!(
        task_id,
        from = summary.from.as_str(),
        to = summary.to.as_str(),
        retries = summary.retries,
        "transition committed"
    );
    Ok(summary)
}

/// Append a new pending task. Ids are never reused.
pub fn add_task(path: &Path, id: &str, goal: &str) -> Result<Task> {
    let mut state = load_state(path)?;
    if state.find(id).is_some() {
        return Err(anyhow!("task id '{id}' already exists"));
    }
    let task = Task::pending(id, goal);
    state.tasks.push(task.clone());
    write_state(path, &state)?;
    Ok(task)
}

/// Count tasks per status, in `pending, done, skipped` order.
pub fn status_counts(state: &ProjectState) -> [(TaskStatus, usize); 3] {
    [TaskStatus::Pending, TaskStatus::Done, TaskStatus::Skipped].map(|status| {
        let count = state
            .tasks
            .iter()
            .filter(|task| task.status == status)
            .count();
        (status, count)
    })
}

fn validate_schema(state: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(STATE_SCHEMA).context("parse state schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(state) {
        let messages = compiled
            .iter_errors(state)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "state schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn validate_state_invariants(state: &ProjectState) -> Result<()> {
    let errors = validate_invariants(state);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("state invariants failed: {}", errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{done, pending, state_with};
    use chrono::Utc;

    const HAND_WRITTEN: &str = r#"{
  "project": "demo",
  "tasks": [
    { "id": "b", "goal": "second by name, first by order", "status": "pending" },
    { "id": "a", "goal": "reverse a string", "status": "done", "retries": 2,
      "last_result": "cba", "completed_at": "2026-01-02T03:04:05Z" }
  ],
  "owner": { "name": "ops" }
}"#;

    /// Load, no changes, save, load again: same order and fields.
    #[test]
    fn save_without_changes_preserves_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("project_state.json");
        fs::write(&path, HAND_WRITTEN).expect("write");

        let first = load_state(&path).expect("load");
        write_state(&path, &first).expect("save");
        let second = load_state(&path).expect("reload");

        assert_eq!(first, second);
        let ids: Vec<&str> = second.tasks.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(second.reserved.get("project"), Some(&Value::from("demo")));
        assert!(second.reserved.contains_key("owner"));
        assert_eq!(second.tasks[0].retries, 0);
        assert_eq!(second.tasks[1].last_result.as_deref(), Some("cba"));

        let saved = fs::read_to_string(&path).expect("read");
        assert!(!saved.contains("completed_at\": null"));
    }

    #[test]
    fn save_keeps_top_level_key_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("project_state.json");
        fs::write(&path, HAND_WRITTEN).expect("write");

        let mut state = load_state(&path).expect("load");
        state.tasks[0].retries = 1;
        write_state(&path, &state).expect("save");

        let saved = fs::read_to_string(&path).expect("read");
        let doc: Value = serde_json::from_str(&saved).expect("parse");
        let keys: Vec<&str> = doc
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["project", "tasks", "owner"]);
    }

    #[test]
    fn fresh_state_writes_tasks_first() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("project_state.json");
        let mut state = state_with(vec![pending("t1")]);
        state
            .reserved
            .insert("project".to_string(), Value::from("demo"));
        write_state(&path, &state).expect("write");

        let saved = fs::read_to_string(&path).expect("read");
        let tasks_at = saved.find("\"tasks\"").expect("tasks key");
        let project_at = saved.find("\"project\"").expect("project key");
        assert!(tasks_at < project_at);
    }

    #[test]
    fn load_rejects_unknown_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("project_state.json");
        fs::write(
            &path,
            r#"{"tasks":[{"id":"a","goal":"g","status":"retrying"}]}"#,
        )
        .expect("write");

        let err = load_state(&path).unwrap_err();
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("project_state.json");
        fs::write(
            &path,
            r#"{"tasks":[{"id":"a","goal":"g","status":"pending"},{"id":"a","goal":"h","status":"pending"}]}"#,
        )
        .expect("write");

        let err = load_state(&path).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate id"));
    }

    #[test]
    fn commit_transition_persists_immediately() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("project_state.json");
        let mut state = state_with(vec![pending("t1"), pending("t2")]);
        write_state(&path, &state).expect("write");

        commit_transition(
            &path,
            &mut state,
            "t1",
            &Transition::Complete {
                result: "cba".to_string(),
                at: Utc::now(),
            },
            None,
        )
        .expect("commit");

        let reloaded = load_state(&path).expect("reload");
        assert_eq!(reloaded.tasks[0].status, TaskStatus::Done);
        assert_eq!(reloaded.tasks[1].status, TaskStatus::Pending);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn add_task_appends_and_rejects_duplicates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("project_state.json");
        write_state(&path, &state_with(vec![done("t1")])).expect("write");

        add_task(&path, "t2", "print hello").expect("add");
        let err = add_task(&path, "t1", "again").unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let state = load_state(&path).expect("load");
        assert_eq!(state.tasks.len(), 2);
        assert_eq!(state.tasks[1].status, TaskStatus::Pending);
        assert_eq!(
            status_counts(&state),
            [
                (TaskStatus::Pending, 1),
                (TaskStatus::Done, 1),
                (TaskStatus::Skipped, 0)
            ]
        );
    }
}
