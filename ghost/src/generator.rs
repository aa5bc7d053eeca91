//! Command generation, continuation checks and the final explanation.
//!
//! Every operation builds an ordered list of turns from the request, the host snapshot
//! and the running history, then hands it to the [`CompletionService`].

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::history::CommandHistory;
use crate::core::response::{clean_command, clean_prose, is_continue};
use crate::core::types::{ContinuationVerdict, SystemContext, Turn};
use crate::io::completion::{CompletionRequest, CompletionService};
use crate::io::config::TokenBudgets;
use crate::io::prompt::PromptLibrary;

/// History length at which `should_continue` stops without asking the service.
pub const CONTINUATION_CEILING: usize = 5;

const PERMISSION_DENIED_MARKER: &str = "permission denied";

pub const REASON_NOTHING_RUN: &str = "No commands executed yet";
pub const REASON_MAX_REACHED: &str = "Maximum number of commands reached";
pub const REASON_PERMISSION_DENIED: &str = "Permission denied - cannot continue";

const CONTINUATION_QUESTION: &str = "Do we have enough information to answer the original request, or should we continue with more commands?";
const EXPLAIN_VERBOSE: &str =
    "Please provide a detailed explanation of what was accomplished and what the results mean.";
const EXPLAIN_TERSE: &str = "Please provide a concise summary answering the original request.";

/// Builds conversations for the three completion-backed operations.
pub struct CommandGenerator<C> {
    completion: C,
    prompts: PromptLibrary,
    tokens: TokenBudgets,
}

impl<C: CompletionService> CommandGenerator<C> {
    pub fn new(completion: C, tokens: TokenBudgets) -> Self {
        Self {
            completion,
            prompts: PromptLibrary::new(),
            tokens,
        }
    }

    pub fn completion(&self) -> &C {
        &self.completion
    }

    /// Produce the next candidate command, cleaned of fences, quotes and placeholders.
    ///
    /// `failed_attempt` names a command that just failed and asks for something else.
    #[instrument(skip_all, fields(history = history.len(), retry = failed_attempt.is_some()))]
    pub fn generate_command(
        &self,
        request: &str,
        context: &SystemContext,
        history: &CommandHistory,
        failed_attempt: Option<&str>,
    ) -> Result<String> {
        let system = self.prompts.command_generation(context)?;
        let turns = command_turns(system, request, history, failed_attempt);
        let raw = self
            .completion
            .complete(&CompletionRequest::new(turns, self.tokens.command))
            .context("generate command")?;
        let command = clean_command(&raw);
        debug!(%raw, %command, "candidate generated");
        Ok(command)
    }

    /// Decide whether another generate/execute cycle is warranted.
    ///
    /// Empty history, the ceiling and a permission-denied failure are decided locally;
    /// only the remaining cases reach the completion service.
    #[instrument(skip_all, fields(history = history.len()))]
    pub fn should_continue(
        &self,
        request: &str,
        history: &CommandHistory,
        context: &SystemContext,
    ) -> Result<ContinuationVerdict> {
        if let Some(verdict) = local_verdict(history) {
            info!(reason = %verdict.reason, "continuation decided locally");
            return Ok(verdict);
        }

        let system = self.prompts.continuation_analysis(context)?;
        let turns = continuation_turns(system, request, history);
        let raw = self
            .completion
            .complete(&CompletionRequest::new(turns, self.tokens.continuation))
            .context("check continuation")?;
        let reason = clean_prose(&raw);
        let verdict = if is_continue(&raw) {
            ContinuationVerdict::proceed(reason)
        } else {
            ContinuationVerdict::stop(reason)
        };
        info!(should_continue = verdict.should_continue, "continuation decided");
        Ok(verdict)
    }

    /// Final human-readable answer over the complete, untruncated history.
    #[instrument(skip_all, fields(history = history.len(), verbose = verbose))]
    pub fn generate_explanation(
        &self,
        request: &str,
        history: &CommandHistory,
        context: &SystemContext,
        verbose: bool,
    ) -> Result<String> {
        let system = self.prompts.explanation(context, verbose)?;
        let turns = explanation_turns(system, request, history, verbose);
        let max_tokens = if verbose {
            self.tokens.explanation_verbose
        } else {
            self.tokens.explanation
        };
        let raw = self
            .completion
            .complete(&CompletionRequest::new(turns, max_tokens))
            .context("generate explanation")?;
        Ok(clean_prose(&raw))
    }
}

fn local_verdict(history: &CommandHistory) -> Option<ContinuationVerdict> {
    let Some(last) = history.last() else {
        return Some(ContinuationVerdict::proceed(REASON_NOTHING_RUN));
    };
    if history.len() >= CONTINUATION_CEILING {
        return Some(ContinuationVerdict::stop(REASON_MAX_REACHED));
    }
    let permission_denied = !last.success()
        && last.stdout.is_empty()
        && last.stderr.to_lowercase().contains(PERMISSION_DENIED_MARKER);
    permission_denied.then(|| ContinuationVerdict::stop(REASON_PERMISSION_DENIED))
}

fn command_turns(
    system: String,
    request: &str,
    history: &CommandHistory,
    failed_attempt: Option<&str>,
) -> Vec<Turn> {
    let mut turns = vec![Turn::system(system), Turn::user(request)];
    if !history.is_empty() {
        turns.push(Turn::user(history.command_digest()));
    }
    if let Some(failed) = failed_attempt {
        turns.push(Turn::user(format!(
            "Previous command failed: {failed}\nPlease suggest a better alternative."
        )));
    }
    turns
}

fn continuation_turns(system: String, request: &str, history: &CommandHistory) -> Vec<Turn> {
    let mut turns = vec![
        Turn::system(system),
        Turn::user(format!(
            "Original request: {request}\n\nCommands executed so far:"
        )),
    ];
    turns.extend(history.continuation_blocks().into_iter().map(Turn::user));
    turns.push(Turn::user(CONTINUATION_QUESTION));
    turns
}

fn explanation_turns(
    system: String,
    request: &str,
    history: &CommandHistory,
    verbose: bool,
) -> Vec<Turn> {
    let mut turns = vec![
        Turn::system(system),
        Turn::user(format!("Original request: {request}\n\nCommands executed:")),
    ];
    turns.extend(history.transcript_blocks().into_iter().map(Turn::user));
    turns.push(Turn::user(if verbose {
        EXPLAIN_VERBOSE
    } else {
        EXPLAIN_TERSE
    }));
    turns
}
