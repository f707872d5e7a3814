//! Tracing setup for the operator console.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: narration of every cycle step, output to stderr.
//!   Filtered by `RUST_LOG`, not persisted.
//!
//! - **Cycle journal (`io/cycle_log`)**: plan, code, execution output and review
//!   per cycle in `.metaloop/cycles/`. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "metaloop=info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `metaloop=info` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=metaloop=debug metaloop run
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
