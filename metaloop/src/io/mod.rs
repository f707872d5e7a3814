//! I/O for the cycle controller: filesystem, model gateway, and code execution.

pub mod atomic;
pub mod config;
pub mod cycle_log;
pub mod gateway;
pub mod init;
pub mod process;
pub mod prompt;
pub mod sandbox;
pub mod task_store;
