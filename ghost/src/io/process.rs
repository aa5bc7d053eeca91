//! Helpers for running child processes with an optional timeout and bounded output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_truncated_notice(&self) -> String {
        truncated_notice("stdout", self.stdout_truncated)
    }

    pub fn stderr_truncated_notice(&self) -> String {
        truncated_notice("stderr", self.stderr_truncated)
    }
}

/// Process groups of bounded children that are still running.
///
/// Bounded children leave the terminal's foreground group, so a terminal Ctrl-C no
/// longer reaches them. The interrupt handler kills whatever is registered here.
#[derive(Debug, Default)]
pub struct ChildGroups {
    pids: Mutex<Vec<u32>>,
}

impl ChildGroups {
    pub const fn new() -> Self {
        Self {
            pids: Mutex::new(Vec::new()),
        }
    }

    /// Track `pid` until the returned guard is dropped.
    pub fn register(&self, pid: u32) -> GroupRegistration<'_> {
        self.lock().push(pid);
        GroupRegistration { groups: self, pid }
    }

    pub fn active(&self) -> Vec<u32> {
        self.lock().clone()
    }

    /// Kill every registered group and return how many were signalled.
    pub fn kill_all(&self) -> usize {
        let pids = self.active();
        for &pid in &pids {
            kill_process_group(pid);
        }
        pids.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u32>> {
        self.pids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Removes its pid from [`ChildGroups`] on drop.
#[derive(Debug)]
pub struct GroupRegistration<'a> {
    groups: &'a ChildGroups,
    pid: u32,
}

impl Drop for GroupRegistration<'_> {
    fn drop(&mut self) {
        self.groups.lock().retain(|&pid| pid != self.pid);
    }
}

/// Groups spawned by [`run_command`] in this process.
pub static ACTIVE_GROUPS: ChildGroups = ChildGroups::new();

/// Install a Ctrl-C handler that kills running bounded children before exiting.
pub fn install_interrupt_handler(exit_code: i32) -> Result<()> {
    ctrlc::set_handler(move || {
        let killed = ACTIVE_GROUPS.kill_all();
        warn!(killed, "interrupted");
        eprintln!("\nInterrupted.");
        std::process::exit(exit_code);
    })
    .context("install Ctrl-C handler")
}

fn truncated_notice(stream: &str, bytes: usize) -> String {
    if bytes > 0 {
        format!("\n[{stream} truncated {bytes} bytes]\n")
    } else {
        String::new()
    }
}

/// Run a command and capture stdout/stderr without risking pipe deadlocks.
///
/// With `timeout` set, the child is killed once the bound elapses and `timed_out` is
/// reported; with `None` the call blocks until the child exits. Output is read
/// concurrently while the child runs, and `output_limit_bytes` bounds how much of each
/// stream is kept (the rest is drained and counted). The caller decides how stdin is
/// wired.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), output_limit_bytes = output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    // Bounded children get their own process group so a timeout can take down
    // grandchildren that would otherwise keep the output pipes open. Ctrl-C reaches
    // them through `ACTIVE_GROUPS`.
    #[cfg(unix)]
    if timeout.is_some() {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let registration = timeout
        .is_some()
        .then(|| ACTIVE_GROUPS.register(child.id()));

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match timeout {
        Some(limit) => match child.wait_timeout(limit).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = limit.as_secs(), "command timed out, killing");
                timed_out = true;
                kill_process_group(child.id());
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
        None => child.wait().context("wait for command")?,
    };
    drop(registration);

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let status = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pid}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        warn!(err = %e, pid, "failed to signal process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
