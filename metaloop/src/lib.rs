//! Autonomous supervisor/coder meta-loop over a persistent task queue.
//!
//! Each cycle takes the first pending task, asks a supervisor model for a plan,
//! asks a coder model to implement it, runs the extracted code under a timeout,
//! and lets the supervisor review the result. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (selection, guards, extraction,
//!   review parsing, state transitions). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, model gateway, process
//!   execution). Isolated behind traits to enable scripted backends in tests.
//!
//! Orchestration modules ([`cycle`], [`looping`], [`select`], [`validate`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod core;
pub mod cycle;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod select;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
