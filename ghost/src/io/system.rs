//! Host snapshot captured once per run.

use std::env;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;

use crate::core::types::SystemContext;
use crate::io::process::run_command;

const DEFAULT_SHELL: &str = "/bin/bash";
const UNKNOWN: &str = "unknown";

/// Capture OS, kernel release, architecture, login shell and working directory.
///
/// Never fails: anything that cannot be probed is reported as `unknown`.
pub fn capture_system_context() -> SystemContext {
    let context = SystemContext {
        os_name: os_display_name(env::consts::OS).to_string(),
        os_release: kernel_release().unwrap_or_else(|| UNKNOWN.to_string()),
        cpu_architecture: env::consts::ARCH.to_string(),
        shell_path: shell_from(env::var("SHELL").ok()),
        working_directory: env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| UNKNOWN.to_string()),
    };
    debug!(?context, "system context captured");
    context
}

/// Platform names as `uname -s` spells them.
fn os_display_name(os: &str) -> &str {
    match os {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        "openbsd" => "OpenBSD",
        "netbsd" => "NetBSD",
        other => other,
    }
}

fn shell_from(var: Option<String>) -> String {
    var.filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SHELL.to_string())
}

fn kernel_release() -> Option<String> {
    if cfg!(windows) {
        return None;
    }
    let mut cmd = Command::new("uname");
    cmd.arg("-r").stdin(Stdio::null());
    let output = run_command(cmd, Some(Duration::from_secs(5)), 4096).ok()?;
    if !output.status.success() {
        return None;
    }
    let release = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!release.is_empty()).then_some(release)
}
