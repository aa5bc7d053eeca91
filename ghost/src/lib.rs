//! Natural-language shell assistant.
//!
//! A request in plain language is turned into a bounded sequence of shell commands:
//! each candidate is generated by a completion service, checked by deterministic safety
//! heuristics, executed, and fed back into a continuation decision. The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (history, safety classification, reply
//!   cleaning). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (processes, the completion client,
//!   terminal prompts, the file editor, config). Each sits behind a trait so tests can
//!   script it.
//!
//! Orchestration modules ([`generator`], [`looping`]) coordinate core logic with I/O;
//! [`display`] renders what happened.

pub mod core;
pub mod display;
pub mod exit_codes;
pub mod generator;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
