//! Test-only fixtures and scripted collaborators for driving the loop without a
//! network, a shell or a terminal.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::types::{CommandResult, SystemContext};
use crate::io::completion::{CompletionRequest, CompletionService, LlmError};
use crate::io::confirm::Prompter;
use crate::io::editor::FileEditor;
use crate::io::shell::ShellRunner;

/// Deterministic host snapshot.
pub fn system_context() -> SystemContext {
    SystemContext {
        os_name: "Linux".to_string(),
        os_release: "6.1.0".to_string(),
        cpu_architecture: "x86_64".to_string(),
        shell_path: "/bin/bash".to_string(),
        working_directory: "/home/user/project".to_string(),
    }
}

/// Fresh temporary directory, removed on drop.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("tempdir")
}

/// Completion service replaying canned replies in order and recording every request.
///
/// Once the script runs out, calls fail with [`LlmError::InvalidResponse`].
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    replies: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: RefCell::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }
}

impl CompletionService for ScriptedCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("completion script exhausted".to_string()))
    }
}

/// Shell replaying canned outcomes in order; the command string is echoed back.
#[derive(Debug, Default)]
pub struct ScriptedShell {
    outcomes: RefCell<VecDeque<(String, String, i32)>>,
    runs: RefCell<Vec<(String, Option<Duration>)>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful run printing `stdout`.
    pub fn ok(self, stdout: &str) -> Self {
        self.then(stdout, "", 0)
    }

    /// Queue a failed run with `stderr` and `exit_code`.
    pub fn fail(self, exit_code: i32, stderr: &str) -> Self {
        self.then("", stderr, exit_code)
    }

    pub fn then(self, stdout: &str, stderr: &str, exit_code: i32) -> Self {
        self.outcomes
            .borrow_mut()
            .push_back((stdout.to_string(), stderr.to_string(), exit_code));
        self
    }

    /// Every `(command, timeout)` the loop ran, in order.
    pub fn runs(&self) -> Vec<(String, Option<Duration>)> {
        self.runs.borrow().clone()
    }
}

impl ShellRunner for ScriptedShell {
    fn run(&self, command: &str, timeout: Option<Duration>) -> CommandResult {
        self.runs.borrow_mut().push((command.to_string(), timeout));
        match self.outcomes.borrow_mut().pop_front() {
            Some((stdout, stderr, exit_code)) => {
                CommandResult::new(command, stdout, stderr, exit_code)
            }
            None => CommandResult::failed(command, "no scripted outcome"),
        }
    }
}

/// Prompter answering from queues and recording every question asked.
///
/// An unexpected question (empty queue) is an error, so tests notice stray prompts.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirms: RefCell<VecDeque<bool>>,
    answers: RefCell<VecDeque<String>>,
    questions: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirms(self, confirms: &[bool]) -> Self {
        self.confirms.borrow_mut().extend(confirms.iter().copied());
        self
    }

    pub fn answers(self, answers: &[&str]) -> Self {
        self.answers
            .borrow_mut()
            .extend(answers.iter().map(|a| a.to_string()));
        self
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str, _default: bool) -> Result<bool> {
        self.questions.borrow_mut().push(question.to_string());
        self.confirms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected confirmation: {question}"))
    }

    fn ask(&self, question: &str) -> Result<String> {
        self.questions.borrow_mut().push(question.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected question: {question}"))
    }
}

/// Editor that records its calls and reports a fixed outcome.
#[derive(Debug)]
pub struct ScriptedEditor {
    saves: bool,
    calls: RefCell<Vec<(String, String)>>,
}

impl ScriptedEditor {
    pub fn saving() -> Self {
        Self {
            saves: true,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn cancelling() -> Self {
        Self {
            saves: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Every `(request, filename)` the editor was opened with.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }
}

impl FileEditor for ScriptedEditor {
    fn interactive_edit(
        &self,
        request: &str,
        filename: &str,
        _context: &SystemContext,
    ) -> Result<bool> {
        assert!(!filename.is_empty(), "editor opened without a filename");
        self.calls
            .borrow_mut()
            .push((request.to_string(), filename.to_string()));
        Ok(self.saves)
    }
}
