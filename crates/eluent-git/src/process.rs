//! Subprocess helper for running `git`, with a hard timeout.
//!
//! The only remaining callers are [`crate::network`]'s fetch and push:
//! every other git operation goes through gix in-process and never spawns
//! a subprocess.

use std::io::Read as _;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::GitError;

/// Poll interval while waiting for a child process with a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period between `SIGTERM` and `SIGKILL` once a timeout fires.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Run `git <args>` in `dir`, killing it and returning [`GitError::Timeout`] if
/// it does not finish within `timeout`.
///
/// # Errors
/// Returns [`GitError::Timeout`] on expiry, [`GitError::CommandFailed`] on a
/// non-zero exit, or [`GitError::Io`] on spawn/wait failure.
pub fn run_with_timeout(
    dir: &std::path::Path,
    args: &[&str],
    timeout: Duration,
) -> Result<String, GitError> {
    let mut child = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes on dedicated threads while polling for exit: git can
    // write more than the OS pipe buffer before exiting (a large ref
    // advertisement, verbose diagnostics), and nothing else here would read
    // it, so the child would block on write() until killed by the timeout.
    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf);
        buf
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            let stdout = stdout_reader.join().unwrap_or_default();
            let stderr = stderr_reader.join().unwrap_or_default();
            return finish(args, status.code(), stdout, stderr);
        }
        if Instant::now() >= deadline {
            kill_hard(&mut child);
            let _ = child.wait();
            let _ = stdout_reader.join();
            let _ = stderr_reader.join();
            return Err(GitError::Timeout {
                command: args.join(" "),
                timeout_secs: timeout.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Send `SIGTERM`, wait a grace period, then `SIGKILL` if still alive.
fn kill_hard(child: &mut Child) {
    let pid = Pid::from_raw(child.id() as i32);
    if signal::kill(pid, Signal::SIGTERM).is_ok() {
        let deadline = Instant::now() + KILL_GRACE;
        while Instant::now() < deadline {
            if matches!(child.try_wait(), Ok(Some(_))) {
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    let _ = child.kill();
}

fn finish(
    args: &[&str],
    code: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
) -> Result<String, GitError> {
    match code {
        Some(0) => Ok(String::from_utf8_lossy(&stdout).into_owned()),
        _ => Err(GitError::command_failed(
            args,
            &String::from_utf8_lossy(&stderr),
            code,
        )),
    }
}
