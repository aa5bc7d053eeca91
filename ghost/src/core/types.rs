//! Shared deterministic types for the command loop.
//!
//! These types define the contracts between the classifier, generator, executor and
//! loop driver. They carry no I/O and are created fresh for every run.

use serde::Serialize;

/// Outcome of running one shell command.
///
/// Immutable once created. The loop replaces a whole entry when a retry supersedes it
/// rather than editing fields in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn new(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// A result describing a command that never produced output (timeout, spawn failure).
    pub fn failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(command, String::new(), message, 1)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Snapshot of the host, captured once at loop start and passed read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemContext {
    pub os_name: String,
    pub os_release: String,
    pub cpu_architecture: String,
    pub shell_path: String,
    pub working_directory: String,
}

impl SystemContext {
    /// Labelled rows in display order.
    pub fn rows(&self) -> [(&'static str, &str); 5] {
        [
            ("OS", &self.os_name),
            ("Release", &self.os_release),
            ("Architecture", &self.cpu_architecture),
            ("Shell", &self.shell_path),
            ("Working directory", &self.working_directory),
        ]
    }
}

/// Per-step decision on whether another generate/execute cycle is warranted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationVerdict {
    pub should_continue: bool,
    pub reason: String,
}

impl ContinuationVerdict {
    pub fn proceed(reason: impl Into<String>) -> Self {
        Self {
            should_continue: true,
            reason: reason.into(),
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            should_continue: false,
            reason: reason.into(),
        }
    }
}

/// Whether a candidate command creates or edits a file, and which one.
///
/// `filename` is only ever `Some` with a non-empty, sanitized path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileEditIntent {
    pub filename: Option<String>,
}

impl FileEditIntent {
    pub fn none() -> Self {
        Self { filename: None }
    }

    pub fn edit(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
        }
    }

    pub fn is_file_edit(&self) -> bool {
        self.filename.is_some()
    }
}

/// Speaker of a conversation turn sent to the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One (role, text) turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
