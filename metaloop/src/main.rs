//! Supervisor/coder meta-loop.
//!
//! Works through the task queue in `.metaloop/state/project_state.json`, one
//! task per cycle: plan with the supervisor model, implement with the coder
//! model, execute the generated code, and let the supervisor review the result.

use std::env;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use metaloop::cycle::run_cycle;
use metaloop::exit_codes;
use metaloop::io::gateway::{GATEWAY_ENV, OllamaGateway, resolve_base_url};
use metaloop::io::init::{InitOptions, LoopPaths, init_project};
use metaloop::io::sandbox::ScriptSandbox;
use metaloop::io::task_store::add_task;
use metaloop::logging;
use metaloop::looping::{LoopOptions, ThreadPacer, run_loop};
use metaloop::select::{SelectOutcome, select_from_root};
use metaloop::task::TaskStatus;
use metaloop::validate::validate_project;

#[derive(Parser)]
#[command(
    name = "metaloop",
    version,
    about = "Autonomous supervisor/coder loop over a task queue"
)]
struct Cli {
    /// Model gateway base URL.
    #[arg(long, global = true, env = GATEWAY_ENV)]
    gateway_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.metaloop/` with role configs, loop config, and an empty task queue.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
        /// Model written into both role configs.
        #[arg(long, default_value = "llama3.2")]
        model: String,
    },
    /// Check configs and the task store against schema and invariants.
    Validate,
    /// Print the id of the next pending task.
    Select,
    /// Append a pending task to the queue.
    Add {
        /// Unique task id.
        id: String,
        /// Natural-language goal.
        goal: String,
    },
    /// Run exactly one cycle.
    Cycle,
    /// Run cycles forever (or up to `--max-cycles`), pausing between them.
    Run {
        #[arg(long)]
        max_cycles: Option<u32>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = env::current_dir().context("resolve current directory")?;
    match cli.command {
        Command::Init { force, model } => cmd_init(&root, force, model),
        Command::Validate => cmd_validate(&root),
        Command::Select => cmd_select(&root),
        Command::Add { id, goal } => cmd_add(&root, &id, &goal),
        Command::Cycle => cmd_cycle(&root, cli.gateway_url),
        Command::Run { max_cycles } => cmd_run(&root, cli.gateway_url, max_cycles),
    }
}

fn cmd_init(root: &Path, force: bool, model: String) -> Result<i32> {
    let paths = init_project(root, &InitOptions { force, model })?;
    println!("initialized {}", paths.loop_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &Path) -> Result<i32> {
    let outcome = validate_project(root)?;
    println!(
        "ok: {} pending, {} done, {} skipped",
        outcome.count(TaskStatus::Pending),
        outcome.count(TaskStatus::Done),
        outcome.count(TaskStatus::Skipped)
    );
    Ok(exit_codes::OK)
}

fn cmd_select(root: &Path) -> Result<i32> {
    match select_from_root(root)? {
        SelectOutcome::Pending(task) => {
            println!("{}", task.id);
            Ok(exit_codes::OK)
        }
        SelectOutcome::Idle => Ok(exit_codes::IDLE),
    }
}

fn cmd_add(root: &Path, id: &str, goal: &str) -> Result<i32> {
    let paths = LoopPaths::new(root);
    let task = add_task(&paths.state_path, id, goal)?;
    println!("added {}", task.id);
    Ok(exit_codes::OK)
}

fn cmd_cycle(root: &Path, gateway_url: Option<String>) -> Result<i32> {
    let gateway = OllamaGateway::new(resolve_base_url(gateway_url))?;
    let outcome = run_cycle(root, &gateway, &ScriptSandbox)?;
    println!("{outcome}");
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, gateway_url: Option<String>, max_cycles: Option<u32>) -> Result<i32> {
    let gateway = OllamaGateway::new(resolve_base_url(gateway_url))?;
    let outcome = run_loop(
        root,
        &gateway,
        &ScriptSandbox,
        &LoopOptions { max_cycles },
        &mut ThreadPacer,
        |outcome| println!("{outcome}"),
    )?;
    println!("stopped after {} cycles", outcome.cycles_run);
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["metaloop", "init"]);
        assert!(matches!(
            cli.command,
            Command::Init { force: false, ref model } if model == "llama3.2"
        ));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["metaloop", "init", "--force", "--model", "qwen2.5-coder"]);
        assert!(matches!(
            cli.command,
            Command::Init { force: true, ref model } if model == "qwen2.5-coder"
        ));
    }

    #[test]
    fn parse_run_with_limit_and_gateway() {
        let cli = Cli::parse_from([
            "metaloop",
            "run",
            "--max-cycles",
            "3",
            "--gateway-url",
            "http://gpu-box:11434",
        ]);
        assert!(matches!(
            cli.command,
            Command::Run {
                max_cycles: Some(3)
            }
        ));
        assert_eq!(cli.gateway_url.as_deref(), Some("http://gpu-box:11434"));
    }

    #[test]
    fn parse_add() {
        let cli = Cli::parse_from(["metaloop", "add", "t1", "Reverse a string"]);
        assert!(matches!(
            cli.command,
            Command::Add { ref id, ref goal } if id == "t1" && goal == "Reverse a string"
        ));
    }
}
