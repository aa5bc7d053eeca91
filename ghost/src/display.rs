//! Plain-text rendering of loop progress and the final answer.
//!
//! Everything here returns strings; the binary decides where they go.

use crate::core::history::ellipsize;
use crate::core::types::{CommandResult, SystemContext};
use crate::looping::{LoopEvent, LoopStop, Summary};

/// Characters of stdout shown for a successful command outside verbose mode.
pub const PREVIEW_CHARS: usize = 100;

/// A titled block of text.
pub fn panel(title: &str, body: &str) -> String {
    format!("== {title} ==\n{}\n==", body.trim_end())
}

/// Renders loop output for one run.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    verbose: bool,
}

impl Renderer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn header(&self, request: &str) -> String {
        panel("Ghost", &format!("Processing request: {request}"))
    }

    pub fn system_info(&self, context: &SystemContext) -> String {
        let rows = context.rows();
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        let body = rows
            .iter()
            .map(|(label, value)| format!("{label:<width$}  {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        panel("System Information", &body)
    }

    pub fn event(&self, event: &LoopEvent) -> Option<String> {
        match event {
            LoopEvent::Candidate { step, command } => Some(format!("\nCommand {step}: {command}")),
            LoopEvent::DangerWarning { command } => Some(format!(
                "Potentially dangerous command detected:\n  {command}"
            )),
            LoopEvent::DangerForced { command } => Some(format!(
                "Running potentially dangerous command without confirmation: {command}"
            )),
            LoopEvent::FileEditDetected { command, .. } => {
                Some(format!("\nDetected file editing command: {command}"))
            }
            LoopEvent::Executed { result } => command_result(result, self.verbose),
            LoopEvent::RetryStarted { .. } => {
                Some("Command failed. Trying alternative approach...".to_string())
            }
            LoopEvent::RetryUnchanged { .. } => {
                Some("No different alternative was suggested.".to_string())
            }
            LoopEvent::Alternative { command } => Some(format!("Alternative command: {command}")),
            LoopEvent::AlternativeDeclined { .. } => Some("Command execution cancelled".to_string()),
            LoopEvent::AlternativeExecuted { result } => command_result(result, true),
        }
    }

    pub fn stop(&self, stop: &LoopStop) -> Option<String> {
        match stop {
            LoopStop::MaxCommands { max_commands } => self
                .verbose
                .then(|| format!("Stopping: reached the limit of {max_commands} commands")),
            LoopStop::Finished { reason } => self.verbose.then(|| format!("Stopping: {reason}")),
            LoopStop::Declined { .. } => Some("Command execution cancelled".to_string()),
            LoopStop::DryRun {
                dangerous,
                file_edit,
                ..
            } => {
                let mut text = String::from("Dry run mode - command not executed");
                if *dangerous {
                    text.push_str("\n  flagged as potentially dangerous");
                }
                if let Some(filename) = file_edit {
                    text.push_str(&format!("\n  would open the file editor for {filename}"));
                }
                Some(text)
            }
            LoopStop::FileEdited { filename } => {
                Some(format!("File editing completed for {filename}"))
            }
            LoopStop::FileEditCancelled { filename } => {
                Some(format!("File editing cancelled for {filename}"))
            }
            LoopStop::EmptyCandidate => Some("No command was generated.".to_string()),
        }
    }

    pub fn summary(&self, summary: &Summary) -> String {
        match summary {
            Summary::NothingExecuted => "No commands were executed.".to_string(),
            Summary::Explained {
                explanation,
                any_success,
            } => {
                let title = if *any_success { "Results" } else { "Failed" };
                format!("\n{}", panel(title, explanation))
            }
        }
    }
}

/// Full panels and exit code when `full` or on failure, otherwise a short preview.
fn command_result(result: &CommandResult, full: bool) -> Option<String> {
    if full || !result.success() {
        let mut blocks = Vec::new();
        if !result.stdout.is_empty() {
            blocks.push(panel("Output", &result.stdout));
        }
        if !result.stderr.is_empty() {
            blocks.push(panel("Errors", &result.stderr));
        }
        blocks.push(format!("Exit code: {}", result.exit_code));
        return Some(blocks.join("\n"));
    }
    (!result.stdout.is_empty()).then(|| ellipsize(&result.stdout, PREVIEW_CHARS))
}
