//! Deterministic, pure logic shared by the cycle controller.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod extract;
pub mod guard;
pub mod invariants;
pub mod review;
pub mod selector;
pub mod transition;
