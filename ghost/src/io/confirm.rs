//! Blocking user input: yes/no confirmations and free-text answers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Synchronous input collaborator. The loop suspends until an answer comes back.
pub trait Prompter {
    /// Ask a yes/no question; an empty answer picks `default`.
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;

    /// Ask for a line of free text, returned trimmed.
    fn ask(&self, question: &str) -> Result<String>;
}

impl<T: Prompter + ?Sized> Prompter for &T {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        (**self).confirm(question, default)
    }

    fn ask(&self, question: &str) -> Result<String> {
        (**self).ask(question)
    }
}

/// Reads answers from stdin, printing questions on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl StdinPrompter {
    fn read_answer(prompt: &str) -> Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}").context("write prompt")?;
        stdout.flush().context("flush prompt")?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("read answer from stdin")?;
        Ok(answer.trim().to_string())
    }
}

impl Prompter for StdinPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let answer = Self::read_answer(&format!("{question} {hint} "))?;
        Ok(parse_yes_no(&answer, default))
    }

    fn ask(&self, question: &str) -> Result<String> {
        Self::read_answer(&format!("{question}: "))
    }
}

/// Interpret a y/n answer; anything unrecognised falls back to `default`.
pub fn parse_yes_no(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}
