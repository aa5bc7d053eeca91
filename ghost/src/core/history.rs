//! Command history owned by the loop driver, and its textual renderings.

use std::ops::Index;

use crate::core::types::CommandResult;

/// Ordered record of executed commands, in execution order.
///
/// Append-only except for [`CommandHistory::replace_last`], which the retry path uses to
/// supersede a failing entry with its alternative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandHistory {
    entries: Vec<CommandResult>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: CommandResult) {
        self.entries.push(result);
    }

    /// Swap the most recent entry for `result`, returning the superseded one.
    ///
    /// On an empty history this appends instead and returns `None`.
    pub fn replace_last(&mut self, result: CommandResult) -> Option<CommandResult> {
        let previous = self.entries.pop();
        self.entries.push(result);
        previous
    }

    pub fn last(&self) -> Option<&CommandResult> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandResult> {
        self.entries.iter()
    }

    pub fn any_success(&self) -> bool {
        self.entries.iter().any(CommandResult::success)
    }

    /// Digest fed back into command generation: status plus truncated output and errors.
    pub fn command_digest(&self) -> String {
        let mut buf = String::from("Previous commands executed:\n");
        for (i, result) in self.entries.iter().enumerate() {
            let status = if result.success() { "SUCCESS" } else { "FAILED" };
            buf.push_str(&format!("{}. {} [{status}]\n", i + 1, result.command));
            if !result.stdout.is_empty() {
                buf.push_str(&format!("   Output: {}\n", ellipsize(&result.stdout, 200)));
            }
            if !result.stderr.is_empty() {
                buf.push_str(&format!("   Error: {}\n", ellipsize(&result.stderr, 100)));
            }
        }
        buf
    }

    /// One rendered block per entry for the continuation check (300/200 characters).
    pub fn continuation_blocks(&self) -> Vec<String> {
        self.render_blocks(Some((300, 200)))
    }

    /// One rendered block per entry with complete output, for the final explanation.
    pub fn transcript_blocks(&self) -> Vec<String> {
        self.render_blocks(None)
    }

    fn render_blocks(&self, limits: Option<(usize, usize)>) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, result)| {
                let status = if result.success() {
                    "successful"
                } else {
                    "failed"
                };
                let (stdout, stderr) = match limits {
                    Some((out, err)) => (
                        truncate_chars(&result.stdout, out),
                        truncate_chars(&result.stderr, err),
                    ),
                    None => (result.stdout.as_str(), result.stderr.as_str()),
                };
                format!(
                    "Command {}: {} ({status})\nOutput: {}\nErrors: {}",
                    i + 1,
                    result.command,
                    or_placeholder(stdout, "(no output)"),
                    or_placeholder(stderr, "(no errors)"),
                )
            })
            .collect()
    }
}

impl Index<usize> for CommandHistory {
    type Output = CommandResult;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl<'a> IntoIterator for &'a CommandHistory {
    type Item = &'a CommandResult;
    type IntoIter = std::slice::Iter<'a, CommandResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// First `max` characters of `text` (character-based, never splits a code point).
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Like [`truncate_chars`] but marks the cut with `...`.
pub fn ellipsize(text: &str, max: usize) -> String {
    let head = truncate_chars(text, max);
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        head.to_string()
    }
}

fn or_placeholder<'a>(text: &'a str, placeholder: &'a str) -> &'a str {
    if text.is_empty() { placeholder } else { text }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(cmd: &str, out: &str) -> CommandResult {
        CommandResult::new(cmd, out, "", 0)
    }

    #[test]
    fn replace_last_keeps_length() {
        let mut history = CommandHistory::new();
        history.push(ok("pwd", "/tmp\n"));
        history.push(CommandResult::new("lss", "", "command not found", 127));

        let superseded = history.replace_last(ok("ls", "a b\n"));

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].command, "ls");
        assert_eq!(superseded.map(|r| r.command), Some("lss".to_string()));
    }

    #[test]
    fn replace_last_on_empty_appends() {
        let mut history = CommandHistory::new();
        assert!(history.replace_last(ok("ls", "")).is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn command_digest_truncates_output_and_errors() {
        let mut history = CommandHistory::new();
        history.push(CommandResult::new("cat big", "x".repeat(250), "e".repeat(150), 1));

        let digest = history.command_digest();
        assert!(digest.starts_with("Previous commands executed:\n1. cat big [FAILED]\n"));
        assert!(digest.contains(&format!("   Output: {}...\n", "x".repeat(200))));
        assert!(digest.contains(&format!("   Error: {}...\n", "e".repeat(100))));
        assert!(!digest.contains(&"x".repeat(201)));
    }

    #[test]
    fn command_digest_skips_empty_streams() {
        let mut history = CommandHistory::new();
        history.push(ok("true", ""));
        assert_eq!(
            history.command_digest(),
            "Previous commands executed:\n1. true [SUCCESS]\n"
        );
    }

    #[test]
    fn continuation_blocks_truncate_without_ellipsis() {
        let mut history = CommandHistory::new();
        history.push(CommandResult::new("find .", "y".repeat(400), "", 0));

        let blocks = history.continuation_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0],
            format!(
                "Command 1: find . (successful)\nOutput: {}\nErrors: (no errors)",
                "y".repeat(300)
            )
        );
    }

    #[test]
    fn transcript_blocks_keep_everything() {
        let mut history = CommandHistory::new();
        history.push(CommandResult::new("dmesg", "z".repeat(5000), "", 0));
        assert!(history.transcript_blocks()[0].contains(&"z".repeat(5000)));
    }

    #[test]
    fn truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(ellipsize("héllo", 2), "hé...");
    }
}
