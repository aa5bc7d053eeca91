//! Deterministic, pure logic behind the command loop.
//!
//! Core modules must be free of I/O side effects. They operate on strings and
//! in-memory history and return deterministic outputs suitable for tests.

pub mod history;
pub mod response;
pub mod safety;
pub mod types;
