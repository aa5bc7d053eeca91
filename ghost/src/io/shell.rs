//! Shell execution of candidate commands.
//!
//! The [`ShellRunner`] trait decouples the loop from real process spawning. Tests use
//! scripted runners that return canned results; [`SystemShell`] runs the command string
//! through `sh -c` (or `cmd /C` on Windows).

use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::core::types::CommandResult;
use crate::io::process::run_command;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Abstraction over shell command execution.
///
/// Implementations never fail: spawn errors, wait errors and timeouts all come back as
/// a failed [`CommandResult`].
pub trait ShellRunner {
    /// Run `command`, killing it after `timeout` when one is given.
    ///
    /// `None` means unbounded: the call blocks until the command exits and stdin stays
    /// attached to the terminal.
    fn run(&self, command: &str, timeout: Option<Duration>) -> CommandResult;
}

/// Runs commands through the platform shell interpreter.
#[derive(Debug, Clone)]
pub struct SystemShell {
    output_limit_bytes: usize,
}

impl SystemShell {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self { output_limit_bytes }
    }

    fn command_for(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_LIMIT_BYTES)
    }
}

impl ShellRunner for SystemShell {
    #[instrument(skip_all, fields(command = command, timeout_secs = timeout.map(|t| t.as_secs())))]
    fn run(&self, command: &str, timeout: Option<Duration>) -> CommandResult {
        let mut cmd = Self::command_for(command);
        if timeout.is_some() {
            cmd.stdin(Stdio::null());
        } else {
            cmd.stdin(Stdio::inherit());
        }

        let output = match run_command(cmd, timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "command could not be executed");
                return CommandResult::failed(command, format!("Error executing command: {err:#}"));
            }
        };

        if output.timed_out {
            let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
            return CommandResult::failed(command, format!("Command timed out after {secs} seconds"));
        }

        let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        stdout.push_str(&output.stdout_truncated_notice());
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        stderr.push_str(&output.stderr_truncated_notice());
        // Killed by a signal: no exit code, report a generic failure.
        let exit_code = output.status.code().unwrap_or(-1);

        info!(exit_code, "command finished");
        CommandResult::new(command, stdout, stderr, exit_code)
    }
}
