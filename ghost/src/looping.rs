//! Bounded generate / gate / execute / continue loop for `ghost <REQUEST>`.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::history::CommandHistory;
use crate::core::safety::{classify_danger, classify_file_edit};
use crate::core::types::{CommandResult, SystemContext};
use crate::generator::CommandGenerator;
use crate::io::completion::CompletionService;
use crate::io::config::GhostConfig;
use crate::io::confirm::Prompter;
use crate::io::editor::FileEditor;
use crate::io::shell::{DEFAULT_COMMAND_TIMEOUT, ShellRunner};

pub const DANGER_QUESTION: &str = "This command could be harmful. Do you want to proceed?";

/// Knobs for one loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Hard cap on history length.
    pub max_commands: usize,
    /// Ask for one alternative after a failed command.
    pub retry: bool,
    /// Skip danger confirmations (the file-edit prompt is still asked).
    pub force: bool,
    /// Stop after the first candidate without executing it.
    pub dry_run: bool,
    pub command_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_commands: 5,
            retry: true,
            force: false,
            dry_run: false,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl LoopConfig {
    pub fn from_config(cfg: &GhostConfig) -> Self {
        Self {
            max_commands: cfg.max_commands,
            retry: cfg.retry,
            command_timeout: cfg.command_timeout(),
            ..Self::default()
        }
    }
}

/// Progress notifications, emitted in order as the loop runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// A candidate for step `step` (1-based) was generated.
    Candidate { step: usize, command: String },
    /// The candidate matched a dangerous shape and needs confirmation.
    DangerWarning { command: String },
    /// A dangerous candidate is going ahead because of `--force`.
    DangerForced { command: String },
    /// The candidate writes a file; the editor divert is being offered.
    FileEditDetected { command: String, filename: String },
    Executed { result: CommandResult },
    /// The last command failed and an alternative is being requested.
    RetryStarted { failed: String },
    /// The alternative was identical (or empty), so nothing is re-run.
    RetryUnchanged { command: String },
    Alternative { command: String },
    AlternativeDeclined { command: String },
    AlternativeExecuted { result: CommandResult },
}

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// History reached `max_commands`.
    MaxCommands { max_commands: usize },
    /// The continuation check said enough has been gathered.
    Finished { reason: String },
    /// A dangerous candidate was not confirmed.
    Declined { command: String },
    /// Dry run: the first candidate with its classification, never executed.
    DryRun {
        command: String,
        dangerous: bool,
        file_edit: Option<String>,
    },
    FileEdited { filename: String },
    FileEditCancelled { filename: String },
    /// The service produced nothing runnable.
    EmptyCandidate,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub history: CommandHistory,
    pub stop: LoopStop,
}

/// What the run ends with once the loop is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    NothingExecuted,
    Explained {
        explanation: String,
        any_success: bool,
    },
}

/// Collaborators the loop drives. All are borrowed for the duration of a run.
pub struct Collaborators<'a, C, S, P, E> {
    pub generator: &'a CommandGenerator<C>,
    pub shell: &'a S,
    pub prompter: &'a P,
    pub editor: &'a E,
}

impl<C, S, P, E> Clone for Collaborators<'_, C, S, P, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, S, P, E> Copy for Collaborators<'_, C, S, P, E> {}

/// The synthetic history entry recorded when the editor saved a file.
pub fn file_edit_result(filename: &str) -> CommandResult {
    CommandResult::new(
        format!("Interactive edit: {filename}"),
        format!("File '{filename}' created/modified successfully"),
        "",
        0,
    )
}

/// Run generate/execute cycles until the cap, a stop verdict, a declined danger
/// confirmation, a dry run, or a file-edit divert ends the run.
///
/// Command failures are recorded, not returned; only completion-service and prompt
/// errors escape as `Err`.
#[instrument(skip_all, fields(max_commands = config.max_commands, dry_run = config.dry_run, force = config.force))]
pub fn run_loop<C, S, P, E, F>(
    collab: Collaborators<'_, C, S, P, E>,
    request: &str,
    context: &SystemContext,
    config: &LoopConfig,
    mut on_event: F,
) -> Result<LoopOutcome>
where
    C: CompletionService,
    S: ShellRunner,
    P: Prompter,
    E: FileEditor,
    F: FnMut(&LoopEvent),
{
    let mut history = CommandHistory::new();
    let stop = loop {
        if history.len() >= config.max_commands {
            break LoopStop::MaxCommands {
                max_commands: config.max_commands,
            };
        }

        let step = history.len() + 1;
        let command = collab
            .generator
            .generate_command(request, context, &history, None)?;
        if command.is_empty() {
            warn!(step, "empty candidate");
            break LoopStop::EmptyCandidate;
        }
        on_event(&LoopEvent::Candidate {
            step,
            command: command.clone(),
        });

        let intent = classify_file_edit(&command);
        if config.dry_run {
            break LoopStop::DryRun {
                dangerous: classify_danger(&command),
                file_edit: intent.filename,
                command,
            };
        }

        if let Some(filename) = intent.filename {
            on_event(&LoopEvent::FileEditDetected {
                command,
                filename: filename.clone(),
            });
            break divert_to_editor(collab, request, context, &mut history, filename)?;
        }

        if !passes_safety_gate(collab.prompter, &command, config.force, &mut on_event)? {
            info!(%command, "dangerous command declined");
            break LoopStop::Declined { command };
        }

        let result = collab.shell.run(&command, Some(config.command_timeout));
        on_event(&LoopEvent::Executed {
            result: result.clone(),
        });
        let failed = !result.success();
        history.push(result);

        if failed && config.retry {
            retry_once(collab, request, context, config, &mut history, &command, &mut on_event)?;
        }

        if history.len() >= config.max_commands {
            continue;
        }
        let verdict = collab
            .generator
            .should_continue(request, &history, context)?;
        if !verdict.should_continue {
            break LoopStop::Finished {
                reason: verdict.reason,
            };
        }
    };

    info!(commands = history.len(), ?stop, "loop finished");
    Ok(LoopOutcome { history, stop })
}

/// Produce the final answer: one explanation call when anything ran, none otherwise.
pub fn summarize<C: CompletionService>(
    generator: &CommandGenerator<C>,
    request: &str,
    history: &CommandHistory,
    context: &SystemContext,
    verbose: bool,
) -> Result<Summary> {
    if history.is_empty() {
        return Ok(Summary::NothingExecuted);
    }
    let explanation = generator.generate_explanation(request, history, context, verbose)?;
    Ok(Summary::Explained {
        explanation,
        any_success: history.any_success(),
    })
}

fn divert_to_editor<C, S, P, E>(
    collab: Collaborators<'_, C, S, P, E>,
    request: &str,
    context: &SystemContext,
    history: &mut CommandHistory,
    filename: String,
) -> Result<LoopStop>
where
    P: Prompter,
    E: FileEditor,
{
    let question = format!("Would you like to use interactive editing mode for '{filename}'?");
    let saved = collab.prompter.confirm(&question, true)?
        && collab.editor.interactive_edit(request, &filename, context)?;
    if saved {
        history.push(file_edit_result(&filename));
        Ok(LoopStop::FileEdited { filename })
    } else {
        Ok(LoopStop::FileEditCancelled { filename })
    }
}

fn passes_safety_gate<P: Prompter>(
    prompter: &P,
    command: &str,
    force: bool,
    on_event: &mut impl FnMut(&LoopEvent),
) -> Result<bool> {
    if !classify_danger(command) {
        return Ok(true);
    }
    if force {
        warn!(%command, "dangerous command forced");
        on_event(&LoopEvent::DangerForced {
            command: command.to_string(),
        });
        return Ok(true);
    }
    on_event(&LoopEvent::DangerWarning {
        command: command.to_string(),
    });
    prompter.confirm(DANGER_QUESTION, false)
}

/// Ask for one alternative to `failed` and, when it differs, run it in place of the
/// failing entry.
fn retry_once<C, S, P, E>(
    collab: Collaborators<'_, C, S, P, E>,
    request: &str,
    context: &SystemContext,
    config: &LoopConfig,
    history: &mut CommandHistory,
    failed: &str,
    on_event: &mut impl FnMut(&LoopEvent),
) -> Result<()>
where
    C: CompletionService,
    S: ShellRunner,
    P: Prompter,
{
    on_event(&LoopEvent::RetryStarted {
        failed: failed.to_string(),
    });
    let alternative = collab
        .generator
        .generate_command(request, context, history, Some(failed))?;
    if alternative.is_empty() || alternative == failed {
        on_event(&LoopEvent::RetryUnchanged {
            command: failed.to_string(),
        });
        return Ok(());
    }

    on_event(&LoopEvent::Alternative {
        command: alternative.clone(),
    });
    if !passes_safety_gate(collab.prompter, &alternative, config.force, &mut *on_event)? {
        on_event(&LoopEvent::AlternativeDeclined {
            command: alternative,
        });
        return Ok(());
    }

    // An alternative that edits a file runs without a bound, attached to the terminal.
    let timeout = if classify_file_edit(&alternative).is_file_edit() {
        None
    } else {
        Some(config.command_timeout)
    };
    let result = collab.shell.run(&alternative, timeout);
    on_event(&LoopEvent::AlternativeExecuted {
        result: result.clone(),
    });
    history.replace_last(result);
    Ok(())
}
