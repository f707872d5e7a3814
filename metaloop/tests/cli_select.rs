//! CLI tests for `metaloop select`, `add`, and `validate`.
//!
//! Spawns the metaloop binary and verifies exit codes match expected values
//! for idle and pending queues.

use std::process::Command;

use metaloop::exit_codes;
use metaloop::io::init::{InitOptions, LoopPaths, init_project};
use metaloop::io::task_store::{add_task, write_state};
use metaloop::task::{ProjectState, Task, TaskStatus};

fn metaloop(root: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_metaloop"));
    cmd.current_dir(root).env("RUST_LOG", "off");
    cmd
}

#[test]
fn select_idle_exits_with_idle_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    init_project(temp.path(), &InitOptions::default()).expect("init");

    let status = metaloop(temp.path())
        .arg("select")
        .status()
        .expect("metaloop select");

    assert_eq!(status.code(), Some(exit_codes::IDLE));
}

#[test]
fn select_prints_first_pending_task() {
    let temp = tempfile::tempdir().expect("tempdir");
    init_project(temp.path(), &InitOptions::default()).expect("init");
    let paths = LoopPaths::new(temp.path());
    let mut finished = Task::pending("a", "already done");
    finished.status = TaskStatus::Skipped;
    finished.skip_reason = Some("manual".to_string());
    write_state(
        &paths.state_path,
        &ProjectState {
            tasks: vec![finished, Task::pending("b", "Reverse a string")],
            ..ProjectState::default()
        },
    )
    .expect("write state");

    let output = metaloop(temp.path())
        .arg("select")
        .output()
        .expect("metaloop select");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "b");
}

#[test]
fn add_rejects_duplicate_ids() {
    let temp = tempfile::tempdir().expect("tempdir");
    init_project(temp.path(), &InitOptions::default()).expect("init");
    let paths = LoopPaths::new(temp.path());
    add_task(&paths.state_path, "t1", "Reverse a string").expect("add");

    let output = metaloop(temp.path())
        .args(["add", "t1", "Something else"])
        .output()
        .expect("metaloop add");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn validate_fails_without_layout() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = metaloop(temp.path())
        .arg("validate")
        .status()
        .expect("metaloop validate");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn init_then_add_then_validate() {
    let temp = tempfile::tempdir().expect("tempdir");

    for args in [
        vec!["init"],
        vec!["add", "t1", "Write a function that reverses a string"],
        vec!["validate"],
    ] {
        let status = metaloop(temp.path())
            .args(&args)
            .status()
            .expect("metaloop");
        assert_eq!(status.code(), Some(exit_codes::OK), "{args:?}");
    }
}
