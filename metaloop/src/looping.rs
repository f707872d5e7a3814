//! Multi-cycle driver for `metaloop run`.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::cycle::{CycleOutcome, run_cycle};
use crate::io::config::load_loop_config;
use crate::io::gateway::ModelGateway;
use crate::io::init::LoopPaths;
use crate::io::sandbox::Sandbox;

/// Options for `run_loop`.
#[derive(Debug, Clone, Default)]
pub struct LoopOptions {
    /// Stop after this many cycles. `None` runs until an error.
    pub max_cycles: Option<u32>,
}

/// Pause between cycles. Tests substitute a recorder.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

/// Pacer that blocks the current thread.
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Summary of a bounded loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub cycles_run: u32,
    pub last: Option<CycleOutcome>,
}

/// Run cycles back to back, pausing `sleep_secs` after each one whatever its
/// outcome (idle included).
///
/// The pause is re-read from `loop.toml` after every cycle. The loop only
/// returns early with an error; configuration and gateway failures are not
/// retried in-process.
pub fn run_loop<G, S, P, F>(
    root: &Path,
    gateway: &G,
    sandbox: &S,
    options: &LoopOptions,
    pacer: &mut P,
    mut on_cycle: F,
) -> Result<LoopOutcome>
where
    G: ModelGateway,
    S: Sandbox,
    P: Pacer,
    F: FnMut(&CycleOutcome),
{
    let paths = LoopPaths::new(root);
    let mut cycles_run = 0u32;
    let mut last = None;

    loop {
        if options.max_cycles.is_some_and(|max| cycles_run >= max) {
            info!(cycles_run, "cycle limit reached");
            return Ok(LoopOutcome { cycles_run, last });
        }

        let outcome = run_cycle(root, gateway, sandbox)?;
        cycles_run += 1;
        on_cycle(&outcome);
        last = Some(outcome);

        if options.max_cycles.is_some_and(|max| cycles_run >= max) {
            continue;
        }
        let pause = load_loop_config(&paths.config_path)?.sleep();
        debug!(secs = pause.as_secs(), "sleeping before next cycle");
        pacer.pause(pause);
    }
}
