//! Normalization of raw completion text.
//!
//! Completions are asked for a bare command but routinely come back wrapped in markdown
//! fences, inline backticks or quotes, or with template placeholders echoed from the
//! prompt. Cleaning is idempotent: an already-clean command comes back unchanged.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Bare fence language tags dropped when they open a multi-line reply.
const LANGUAGE_TAGS: &[&str] = &[
    "bash",
    "sh",
    "shell",
    "zsh",
    "console",
    "python",
    "javascript",
    "html",
    "css",
    "json",
    "yaml",
];

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*response_code\s*\}\}|\{\{|\}\}|<placeholder>").expect("placeholder regex")
});

/// Remove template-placeholder markup (`{{response_code}}`, `{{`, `}}`, `<placeholder>`).
pub fn strip_placeholders(text: &str) -> Cow<'_, str> {
    PLACEHOLDER_RE.replace_all(text, "")
}

/// Turn a raw completion into a single runnable command string.
pub fn clean_command(raw: &str) -> String {
    let text = strip_placeholders(raw).replace("```", "");
    let mut lines: Vec<&str> = text.trim().lines().collect();
    if lines.len() > 1 && is_language_tag(lines[0]) {
        lines.remove(0);
    }
    unwrap_quotes(lines.join("\n").trim()).trim().to_string()
}

/// Placeholder-free, trimmed prose for explanations and file content.
pub fn clean_prose(raw: &str) -> String {
    strip_placeholders(raw).trim().to_string()
}

/// Strip a markdown fence wrapping the whole reply, keeping inner content verbatim.
pub fn strip_fence(raw: &str) -> String {
    let cleaned = clean_prose(raw);
    let Some(inner) = cleaned.strip_prefix("```") else {
        return cleaned;
    };
    let Some(inner) = inner.strip_suffix("```") else {
        return cleaned;
    };
    // Drop the info string (`python`, `toml`, ...) on the opening fence line.
    match inner.split_once('\n') {
        Some((first, rest)) if !first.trim().contains(' ') => rest.trim_end().to_string(),
        _ => inner.trim().to_string(),
    }
}

/// True iff the cleaned reply starts with `CONTINUE`, case-insensitively.
///
/// Anything else, including ambiguous text, is a stop.
pub fn is_continue(raw: &str) -> bool {
    clean_command(raw)
        .get(..8)
        .is_some_and(|head| head.eq_ignore_ascii_case("CONTINUE"))
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim().to_ascii_lowercase();
    LANGUAGE_TAGS.contains(&tag.as_str())
}

/// Peel matching quote pairs that wrap the entire text, e.g. `"ls -la"` or `` `pwd` ``.
fn unwrap_quotes(mut text: &str) -> &str {
    loop {
        let mut chars = text.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return text;
        };
        if first != last || !matches!(first, '"' | '\'' | '`') {
            return text;
        }
        let inner = &text[1..text.len() - 1];
        if inner.contains(first) {
            return text;
        }
        text = inner.trim();
    }
}
