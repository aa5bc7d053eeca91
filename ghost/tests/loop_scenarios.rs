//! End-to-end loop sessions driven through scripted collaborators.
//!
//! Each test scripts the completion replies, shell outcomes and user answers for one
//! run and checks the final history, the stop reason and which collaborators were hit.

use ghost::core::types::CommandResult;
use ghost::generator::{CommandGenerator, REASON_MAX_REACHED, REASON_PERMISSION_DENIED};
use ghost::io::config::TokenBudgets;
use ghost::looping::{
    Collaborators, DANGER_QUESTION, LoopConfig, LoopOutcome, LoopStop, Summary, file_edit_result,
    run_loop, summarize,
};
use ghost::test_support::{
    ScriptedCompletion, ScriptedEditor, ScriptedPrompter, ScriptedShell, system_context,
};

const REQUEST: &str = "list files in current directory";

struct Session {
    generator: CommandGenerator<ScriptedCompletion>,
    shell: ScriptedShell,
    prompter: ScriptedPrompter,
    editor: ScriptedEditor,
}

impl Session {
    fn new(replies: &[&str], shell: ScriptedShell) -> Self {
        Self {
            generator: CommandGenerator::new(
                ScriptedCompletion::new(replies),
                TokenBudgets::default(),
            ),
            shell,
            prompter: ScriptedPrompter::new(),
            editor: ScriptedEditor::saving(),
        }
    }

    fn with_prompter(mut self, prompter: ScriptedPrompter) -> Self {
        self.prompter = prompter;
        self
    }

    fn with_editor(mut self, editor: ScriptedEditor) -> Self {
        self.editor = editor;
        self
    }

    fn run(&self, config: &LoopConfig) -> LoopOutcome {
        run_loop(
            Collaborators {
                generator: &self.generator,
                shell: &self.shell,
                prompter: &self.prompter,
                editor: &self.editor,
            },
            REQUEST,
            &system_context(),
            config,
            |_| {},
        )
        .expect("loop")
    }

    fn summarize(&self, outcome: &LoopOutcome) -> Summary {
        summarize(
            &self.generator,
            REQUEST,
            &outcome.history,
            &system_context(),
            false,
        )
        .expect("summary")
    }

    fn service_calls(&self) -> usize {
        self.generator.completion().calls()
    }
}

/// Verifies the single-step happy path: generate, execute, stop, explain.
#[test]
fn list_files_runs_once_and_explains() {
    let session = Session::new(
        &["ls -la", "DONE", "Two files: a.txt and b.txt"],
        ScriptedShell::new().ok("a.txt\nb.txt\n"),
    );

    let outcome = session.run(&LoopConfig::default());
    assert_eq!(outcome.history.len(), 1);
    assert!(outcome.history[0].success());
    assert!(matches!(outcome.stop, LoopStop::Finished { .. }));

    let summary = session.summarize(&outcome);
    assert_eq!(
        summary,
        Summary::Explained {
            explanation: "Two files: a.txt and b.txt".into(),
            any_success: true,
        }
    );
    assert_eq!(session.service_calls(), 3);
    assert!(session.prompter.questions().is_empty());
}

/// Verifies a declined dangerous candidate never executes and needs no explanation.
#[test]
fn declined_danger_stops_with_empty_history() {
    let session = Session::new(&["rm -rf /tmp/build"], ScriptedShell::new())
        .with_prompter(ScriptedPrompter::new().confirms(&[false]));

    let outcome = session.run(&LoopConfig::default());
    assert!(outcome.history.is_empty());
    assert_eq!(
        outcome.stop,
        LoopStop::Declined {
            command: "rm -rf /tmp/build".into()
        }
    );
    assert!(session.shell.runs().is_empty());
    assert_eq!(session.prompter.questions(), vec![DANGER_QUESTION.to_string()]);

    assert_eq!(session.summarize(&outcome), Summary::NothingExecuted);
    assert_eq!(session.service_calls(), 1);
}

/// Verifies a file-creation candidate diverts to the editor and ends the run.
#[test]
fn redirect_to_file_diverts_to_editor() {
    let session = Session::new(&["cat > report.txt"], ScriptedShell::new())
        .with_prompter(ScriptedPrompter::new().confirms(&[true]));

    let outcome = session.run(&LoopConfig::default());
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.history[0], file_edit_result("report.txt"));
    assert_eq!(outcome.history[0].exit_code, 0);
    assert_eq!(
        outcome.stop,
        LoopStop::FileEdited {
            filename: "report.txt".into()
        }
    );
    assert_eq!(
        session.editor.calls(),
        vec![(REQUEST.to_string(), "report.txt".to_string())]
    );
    // No continuation check after a divert.
    assert_eq!(session.service_calls(), 1);
    assert!(session.shell.runs().is_empty());
}

/// Verifies an editor cancellation ends the run without a history entry.
#[test]
fn cancelled_edit_leaves_history_empty() {
    let session = Session::new(&["nano notes.txt"], ScriptedShell::new())
        .with_prompter(ScriptedPrompter::new().confirms(&[true]))
        .with_editor(ScriptedEditor::cancelling());

    let outcome = session.run(&LoopConfig::default());
    assert!(outcome.history.is_empty());
    assert_eq!(
        outcome.stop,
        LoopStop::FileEditCancelled {
            filename: "notes.txt".into()
        }
    );
}

/// Verifies a command that is both dangerous and a file edit is routed to the editor.
#[test]
fn file_edit_divert_supersedes_safety_gate() {
    let session = Session::new(&["echo '127.0.0.1 dev' > /etc/hosts"], ScriptedShell::new())
        .with_prompter(ScriptedPrompter::new().confirms(&[true]));

    let outcome = session.run(&LoopConfig::default());
    assert_eq!(
        outcome.stop,
        LoopStop::FileEdited {
            filename: "/etc/hosts".into()
        }
    );
    assert_eq!(
        session.prompter.questions(),
        vec!["Would you like to use interactive editing mode for '/etc/hosts'?".to_string()]
    );
}

/// Verifies a successful retry replaces the failing entry instead of appending.
#[test]
fn retry_alternative_replaces_failing_entry() {
    let session = Session::new(
        &["lss", "ls", "DONE"],
        ScriptedShell::new()
            .fail(127, "sh: lss: command not found")
            .ok("a.txt\n"),
    );

    let outcome = session.run(&LoopConfig::default());
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.history[0], CommandResult::new("ls", "a.txt\n", "", 0));
    assert_eq!(session.shell.runs().len(), 2);

    let retry_request = &session.generator.completion().requests()[1];
    let last_turn = retry_request.turns.last().expect("turn");
    assert_eq!(
        last_turn.content,
        "Previous command failed: lss\nPlease suggest a better alternative."
    );
}

/// Verifies an identical alternative is never executed a second time.
#[test]
fn identical_alternative_is_not_rerun() {
    let session = Session::new(
        &["lss", "```\nlss\n```", "DONE"],
        ScriptedShell::new().fail(127, "sh: lss: command not found"),
    );

    let outcome = session.run(&LoopConfig::default());
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.history[0].command, "lss");
    assert_eq!(session.shell.runs().len(), 1);
}

/// Verifies a declined dangerous alternative leaves the failure in place and the loop
/// carries on to the continuation check.
#[test]
fn declined_dangerous_alternative_keeps_failure() {
    let session = Session::new(
        &["rmdir build", "rm -rf ~/build", "DONE"],
        ScriptedShell::new().fail(1, "rmdir: build: Directory not empty"),
    )
    .with_prompter(ScriptedPrompter::new().confirms(&[false]));

    let outcome = session.run(&LoopConfig::default());
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.history[0].command, "rmdir build");
    assert!(matches!(outcome.stop, LoopStop::Finished { .. }));
    assert_eq!(session.shell.runs().len(), 1);
    assert_eq!(session.service_calls(), 3);
}

/// Verifies retry can be switched off.
#[test]
fn no_retry_moves_straight_to_continuation() {
    let session = Session::new(
        &["lss", "DONE"],
        ScriptedShell::new().fail(127, "sh: lss: command not found"),
    );
    let config = LoopConfig {
        retry: false,
        ..LoopConfig::default()
    };

    let outcome = session.run(&config);
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(session.service_calls(), 2);
}

/// Verifies the permission-denied fast stop skips the service.
#[test]
fn permission_denied_stops_locally() {
    let session = Session::new(
        &["cat /etc/shadow"],
        ScriptedShell::new().fail(1, "cat: /etc/shadow: Permission denied"),
    );
    let config = LoopConfig {
        retry: false,
        ..LoopConfig::default()
    };

    let outcome = session.run(&config);
    assert_eq!(
        outcome.stop,
        LoopStop::Finished {
            reason: REASON_PERMISSION_DENIED.into()
        }
    );
    assert_eq!(session.service_calls(), 1);
}

/// Verifies history never exceeds `max_commands`.
#[test]
fn history_is_capped_by_max_commands() {
    let session = Session::new(
        &["echo 1", "CONTINUE", "echo 2", "CONTINUE", "echo 3"],
        ScriptedShell::new().ok("1").ok("2").ok("3"),
    );
    let config = LoopConfig {
        max_commands: 3,
        ..LoopConfig::default()
    };

    let outcome = session.run(&config);
    assert_eq!(outcome.history.len(), 3);
    assert_eq!(outcome.stop, LoopStop::MaxCommands { max_commands: 3 });
    assert_eq!(session.service_calls(), 5);
    assert_eq!(session.generator.completion().remaining(), 0);
}

/// Verifies the continuation ceiling applies even when the loop cap is higher.
#[test]
fn continuation_ceiling_stops_a_longer_loop() {
    let session = Session::new(
        &[
            "echo 1", "CONTINUE", "echo 2", "CONTINUE", "echo 3", "CONTINUE", "echo 4",
            "CONTINUE", "echo 5",
        ],
        ScriptedShell::new()
            .ok("1")
            .ok("2")
            .ok("3")
            .ok("4")
            .ok("5"),
    );
    let config = LoopConfig {
        max_commands: 10,
        ..LoopConfig::default()
    };

    let outcome = session.run(&config);
    assert_eq!(outcome.history.len(), 5);
    assert_eq!(
        outcome.stop,
        LoopStop::Finished {
            reason: REASON_MAX_REACHED.into()
        }
    );
    assert_eq!(session.service_calls(), 9);
}

/// Verifies a service outage during the run escapes as an error.
#[test]
fn service_failure_is_an_error() {
    let session = Session::new(&[], ScriptedShell::new());
    let result = run_loop(
        Collaborators {
            generator: &session.generator,
            shell: &session.shell,
            prompter: &session.prompter,
            editor: &session.editor,
        },
        REQUEST,
        &system_context(),
        &LoopConfig::default(),
        |_| {},
    );
    let err = result.expect_err("exhausted script");
    assert!(format!("{err:#}").contains("generate command"));
}
