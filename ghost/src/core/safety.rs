//! Deterministic safety heuristics over candidate commands.
//!
//! Both classifiers are stateless and operate on the raw command string. The danger
//! check is a conservative denylist aimed at the common catastrophic cases; it is not a
//! sandbox and misses plenty.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::response::strip_placeholders;
use crate::core::types::FileEditIntent;

/// Lowercase substrings that mark a command as destructive wherever they appear.
const DANGEROUS_SUBSTRINGS: &[&str] = &[
    "rm -rf /",
    "rm -rf *",
    "rm -rf ~",
    "rm -rf $home",
    "rm -fr /",
    "rm -fr *",
    "rm -fr ~",
    "dd if=",
    "mkfs",
    "del /s /q",
    "rmdir /s",
    "init 0",
    "init 6",
    "chmod -r 777 /",
    "chown -r",
    "find / -delete",
    ":(){ :|:& };:",
];

/// Redirection sinks under `/dev` that never touch a real device.
const HARMLESS_SINKS: &[&str] = &["/dev/null", "/dev/stdout", "/dev/stderr", "/dev/tty"];

/// Start of a simple command: line start, after a separator/pipe, or after `sudo`.
const CMD_START: &str = r"(?:^|[;&|(]\s*|\bsudo\s+)";

static POWER_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:shutdown|reboot|halt|poweroff|fdisk)\b").expect("power regex")
});

static FORMAT_UTILITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[;&|]|\bsudo)\s*format(?:\s|$)").expect("format regex"));

static ROOTED_REDIRECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">{1,2}\s*(/[^\s;&|()<>]*)").expect("redirect regex"));

/// Editor and file-creation shapes, tried in order. Group 1 is the target path.
static EDIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:nano|vim?|nvim|emacs|code)\s+(?:-\S+\s+)*(\S+)",
        r"touch\s+(?:-\S+\s+)*(\S+)",
        r"cat\s*>>?\s*(\S+)",
        r"echo\s+.*?>>?\s*(\S+)",
        r"tee\s+(?:-\S+\s+)*(\S+)",
    ]
    .iter()
    .map(|body| Regex::new(&format!("(?i){CMD_START}{body}")).expect("edit regex"))
    .collect()
});

/// Returns true when `command` matches a known destructive shape.
///
/// Also flags any redirection whose target is an absolute path, except the harmless
/// `/dev` sinks in [`HARMLESS_SINKS`].
pub fn classify_danger(command: &str) -> bool {
    let lowered = command.to_lowercase();
    if DANGEROUS_SUBSTRINGS
        .iter()
        .any(|pattern| lowered.contains(pattern))
    {
        return true;
    }
    if POWER_WORDS.is_match(command) || FORMAT_UTILITY.is_match(command) {
        return true;
    }
    ROOTED_REDIRECT
        .captures_iter(command)
        .filter_map(|caps| caps.get(1))
        .any(|target| !HARMLESS_SINKS.contains(&target.as_str()))
}

/// Detect commands that create or edit a file and extract the target filename.
///
/// Editor/creation patterns are tried first; otherwise a `>` redirection to a relative
/// path counts, using the first word after the final `>`.
pub fn classify_file_edit(command: &str) -> FileEditIntent {
    let command = command.trim();

    for pattern in &*EDIT_PATTERNS {
        let Some(raw) = pattern.captures(command).and_then(|caps| caps.get(1)) else {
            continue;
        };
        if let Some(filename) = accept_filename(raw.as_str()) {
            return FileEditIntent::edit(filename);
        }
    }

    if let Some((_, rhs)) = command.rsplit_once('>') {
        let target = rhs.split_whitespace().next().unwrap_or_default();
        if let Some(filename) = accept_filename(target)
            && !filename.starts_with('/')
        {
            return FileEditIntent::edit(filename);
        }
    }

    FileEditIntent::none()
}

/// Strip quoting characters and echoed template placeholders from a filename.
pub fn sanitize_filename(raw: &str) -> String {
    let without_placeholders = strip_placeholders(raw);
    without_placeholders
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`'))
        .collect::<String>()
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string()
}

fn accept_filename(raw: &str) -> Option<String> {
    let filename = sanitize_filename(raw);
    let usable = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.starts_with('-')
        && !filename.starts_with('&')
        && !filename.starts_with("/dev/");
    usable.then_some(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit_target(command: &str) -> Option<String> {
        classify_file_edit(command).filename
    }

    #[test]
    fn flags_recursive_deletes() {
        for command in [
            "rm -rf /",
            "sudo rm -rf /",
            "rm -rf /tmp/build",
            "rm -rf *",
            "rm -rf ~",
            "RM -RF $HOME",
            "find / -delete",
        ] {
            assert!(classify_danger(command), "{command}");
        }
    }

    #[test]
    fn flags_disk_and_power_operations() {
        for command in [
            "dd if=/dev/zero of=/dev/sda",
            "mkfs.ext4 /dev/sdb1",
            "sudo fdisk /dev/sda",
            "shutdown -h now",
            "reboot",
            "init 0",
            "format c:",
            "chmod -R 777 /",
            "chown -R nobody /",
        ] {
            assert!(classify_danger(command), "{command}");
        }
    }

    #[test]
    fn flags_redirects_to_absolute_paths() {
        assert!(classify_danger("echo hi > /etc/hosts"));
        assert!(classify_danger("cat x >> /etc/profile"));
        assert!(classify_danger("echo 1 >/dev/sda"));
    }

    #[test]
    fn redirect_targets_end_at_shell_separators() {
        for command in [
            "ls 2>/dev/null; echo ok",
            "(ls 2>/dev/null)",
            "ls 2>/dev/null && echo ok",
            "ls missing 2>/dev/null | wc -l",
            "ls 2>/dev/null||true",
        ] {
            assert!(!classify_danger(command), "{command}");
        }
        for command in [
            "echo hi > /etc/hosts; ls",
            "(echo hi >/etc/hosts)",
            "echo 1 >/dev/sda&& sync",
        ] {
            assert!(classify_danger(command), "{command}");
        }
    }

    #[test]
    fn allows_ordinary_commands() {
        for command in [
            "ls -la",
            "df -h",
            "git log --format=%H -n 3",
            "ps aux | grep halting",
            "find . -name '*.rs' 2>/dev/null",
            "cargo build &> /dev/null",
            "echo done > out.txt",
            "rm -rf build",
        ] {
            assert!(!classify_danger(command), "{command}");
        }
    }

    #[test]
    fn extracts_editor_targets() {
        assert_eq!(edit_target("nano notes.txt").as_deref(), Some("notes.txt"));
        assert_eq!(edit_target("vim src/main.rs").as_deref(), Some("src/main.rs"));
        assert_eq!(edit_target("vi -n config.yml").as_deref(), Some("config.yml"));
        assert_eq!(edit_target("sudo nano /etc/hosts").as_deref(), Some("/etc/hosts"));
        assert_eq!(edit_target("touch README.md").as_deref(), Some("README.md"));
    }

    #[test]
    fn extracts_redirection_targets() {
        assert_eq!(edit_target("cat > report.txt").as_deref(), Some("report.txt"));
        assert_eq!(
            edit_target("echo 'hello' > greeting.txt").as_deref(),
            Some("greeting.txt")
        );
        assert_eq!(edit_target("ls | tee -a listing.log").as_deref(), Some("listing.log"));
        assert_eq!(edit_target("sort names >> sorted.txt").as_deref(), Some("sorted.txt"));
    }

    #[test]
    fn sanitizes_quotes_and_placeholders() {
        assert_eq!(edit_target("nano \"my.txt\"").as_deref(), Some("my.txt"));
        assert_eq!(
            edit_target("touch {{response_code}}app.py").as_deref(),
            Some("app.py")
        );
        assert_eq!(sanitize_filename("`x.sh`;"), "x.sh");
    }

    #[test]
    fn device_redirections_are_never_file_edits() {
        assert_eq!(edit_target("echo 1 > /dev/sda"), None);
        assert_eq!(edit_target("cat > /dev/null"), None);
        assert_eq!(edit_target("ls 2>/dev/null"), None);
    }

    #[test]
    fn non_edits_are_rejected() {
        assert_eq!(edit_target("ls -la"), None);
        assert_eq!(edit_target("ls 2>&1"), None);
        assert_eq!(edit_target("grep code src"), None);
        assert_eq!(edit_target("code ."), None);
        assert_eq!(edit_target("echo '{{}}' > \"\""), None);
    }

    #[test]
    fn absolute_fallback_targets_go_to_the_danger_gate() {
        assert_eq!(edit_target("sort names > /tmp/sorted"), None);
        assert!(classify_danger("sort names > /tmp/sorted"));
    }
}
