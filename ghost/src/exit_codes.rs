//! Stable exit codes for the ghost CLI.

/// The run completed. Individual command failures do not change this.
pub const OK: i32 = 0;
/// Startup failed (missing credential, invalid config) or the completion service errored.
pub const INVALID: i32 = 1;
/// Interrupted by Ctrl-C; running bounded children were killed first.
pub const INTERRUPTED: i32 = 130;
