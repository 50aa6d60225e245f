//! External command execution
//!
//! Runners never fail outward: spawn errors, non-zero exits and timeouts all
//! collapse into an empty string. Callers cannot tell "the command failed"
//! from "the command printed nothing".

use std::collections::HashMap;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Reasons a command produced no usable output
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to spawn: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("stdout was not captured")]
    NoStdout,

    #[error("exited with {0}")]
    Exit(ExitStatus),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Runs a shell command line and returns its trimmed stdout
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str) -> String;
}

/// Runs commands through `sh -c` with a fixed timeout
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout_secs: u64) -> Self {
        ShellRunner {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        ShellRunner { timeout }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> String {
        match run_with_timeout(command, self.timeout) {
            Ok(output) => output,
            Err(e) => {
                log::debug!("Command `{}` yielded no output: {}", command, e);
                String::new()
            }
        }
    }
}

/// Run `command` through the shell, killing it once `timeout` elapses
pub fn run_with_timeout(command: &str, timeout: Duration) -> Result<String, RunError> {
    let deadline = Instant::now() + timeout;
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()?;

    // Drain stdout on a separate thread so a chatty command cannot fill the
    // pipe and stall before the deadline.
    let mut stdout = child.stdout.take().ok_or(RunError::NoStdout)?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });

    let remaining = deadline.saturating_duration_since(Instant::now());
    let buf = match rx.recv_timeout(remaining) {
        Ok(buf) => buf,
        Err(_) => {
            kill(&mut child);
            return Err(RunError::Timeout(timeout));
        }
    };

    let status = wait_until(&mut child, deadline, timeout)?;
    if !status.success() {
        return Err(RunError::Exit(status));
    }

    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

fn wait_until(child: &mut Child, deadline: Instant, timeout: Duration) -> Result<ExitStatus, RunError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            kill(child);
            return Err(RunError::Timeout(timeout));
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Kill the shell and every process of its pipeline
///
/// The shell was spawned as the leader of its own process group, so the
/// group id equals its pid.
fn kill(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        log::debug!("killpg({}) failed: {}", pgid, std::io::Error::last_os_error());
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Reuses command output for a short time
///
/// Entries are keyed by the full command line, which already embeds the
/// lookback window, so repeated requests for the same window share one process
/// spawn. A zero TTL disables caching.
pub struct CachedRunner<R> {
    inner: R,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl<R: CommandRunner> CachedRunner<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        CachedRunner {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, command: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(command)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, output)| output.clone())
    }

    /// Drop expired entries
    pub fn prune(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
    }
}

impl<R: CommandRunner> CommandRunner for CachedRunner<R> {
    fn run(&self, command: &str) -> String {
        if self.ttl.is_zero() {
            return self.inner.run(command);
        }
        if let Some(output) = self.cached(command) {
            return output;
        }

        let output = self.inner.run(command);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(command.to_string(), (Instant::now(), output.clone()));
        output
    }
}

/// Canned outputs keyed by a substring of the command line
///
/// The first registered pattern contained in the command wins; anything
/// unmatched yields an empty string, like a missing tool would.
#[derive(Debug, Default)]
pub struct StaticRunner {
    outputs: Vec<(String, String)>,
    calls: Mutex<Vec<String>>,
}

impl StaticRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, pattern: &str, output: &str) -> Self {
        self.outputs.push((pattern.to_string(), output.to_string()));
        self
    }

    /// Every command line this runner has been asked to execute
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CommandRunner for StaticRunner {
    fn run(&self, command: &str) -> String {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.to_string());
        self.outputs
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.trim().to_string())
            .unwrap_or_default()
    }
}
