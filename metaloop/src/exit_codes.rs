//! Stable exit codes for metaloop CLI commands.

/// Command succeeded or a pending task was selected.
pub const OK: i32 = 0;
/// Command failed due to invalid layout/config/state or other errors.
pub const INVALID: i32 = 1;
/// `metaloop select` found no pending task.
pub const IDLE: i32 = 2;
