//! External process execution.
//!
//! Everything the rest of the crate does to a working tree — git plumbing,
//! the PR-publisher host CLI, an agent's own commands during conflict
//! resolution — goes through [`CommandExecutor::run`]. This is the **only**
//! way to spawn a child process, mirroring the rule in
//! `worktrunk::shell_exec`: a single chokepoint gives consistent logging,
//! timeout handling, and environment normalization.

mod policy;

pub use policy::CommandPolicy;

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::cancellation::CancellationToken;

/// How often the wait loop polls the child and the cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Deterministic environment overrides applied over the caller's environment
/// so porcelain parsers see stable, locale-independent output.
const DETERMINISTIC_ENV: &[(&str, &str)] = &[("GIT_PAGER", ""), ("LANG", "C"), ("LC_ALL", "C")];

/// Grace period between a graceful termination signal and a forced kill.
const GRACEFUL_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Outcome of a single command invocation.
///
/// Unlike `anyhow`-style bailing, a nonzero exit is not an error here — it is
/// data. Higher layers (the VCS backend, the merge pipeline) decide what a
/// given exit code or stderr pattern means.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub cancelled: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && !self.cancelled && self.exit_code == Some(0)
    }
}

/// A command that failed to even start (binary missing, permission denied, …)
/// or was rejected by [`CommandPolicy`]. Distinct from a nonzero exit code,
/// which is carried in [`CommandOutput`] instead.
#[derive(Debug)]
pub struct CommandError {
    pub command: String,
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
    pub stderr: Option<String>,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to run {} {}: {}",
            self.command,
            self.args.join(" "),
            self.stderr.as_deref().unwrap_or("spawn failed")
        )
    }
}

impl std::error::Error for CommandError {}

/// Runs external processes with timeout, cancellation, and captured output.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    policy: Option<CommandPolicy>,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self { policy: None }
    }

    /// Enable the read-only safety gate, rejecting commands that match
    /// [`CommandPolicy`]'s destructive-command patterns.
    pub fn with_read_only_policy(mut self) -> Self {
        self.policy = Some(CommandPolicy::destructive_defaults());
        self
    }

    /// Run `command args…` in `cwd`, merging `env` over the caller's
    /// environment plus the deterministic overrides.
    ///
    /// Returns `Err` only if the process could not be spawned, or the
    /// read-only policy rejected it. A nonzero exit, a timeout, or a
    /// cancellation is reported in the returned [`CommandOutput`] instead.
    pub fn run(
        &self,
        command: &str,
        args: &[&str],
        cwd: &Path,
        env: &HashMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        self.run_cancellable(command, args, cwd, env, timeout, None)
    }

    /// Like [`Self::run`], but polls `cancel` alongside the timeout and kills
    /// the child the moment it's set.
    pub fn run_cancellable(
        &self,
        command: &str,
        args: &[&str],
        cwd: &Path,
        env: &HashMap<String, String>,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<CommandOutput, CommandError> {
        if let Some(policy) = &self.policy
            && let Some(reason) = policy.reject(command, args)
        {
            return Err(CommandError {
                command: command.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                exit_code: None,
                stderr: Some(format!("rejected by read-only policy: {reason}")),
            });
        }

        let cmd_str = format!("{command} {}", args.join(" "));
        log::debug!("$ {cmd_str} [{}]", cwd.display());

        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in env {
            cmd.env(k, v);
        }
        for (k, v) in DETERMINISTIC_ENV {
            cmd.env(k, v);
        }

        let t0 = Instant::now();
        let mut child = cmd.spawn().map_err(|e| CommandError {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            exit_code: None,
            stderr: Some(e.to_string()),
        })?;

        // Drain stdout/stderr on dedicated threads before waiting on the
        // child: a child writing past the OS pipe buffer while nothing reads
        // the other end would otherwise deadlock against wait().
        let stdout_buf = Arc::new(Mutex::new(String::new()));
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stdout_handle = child.stdout.take().map(|pipe| spawn_reader(pipe, stdout_buf.clone()));
        let stderr_handle = child.stderr.take().map(|pipe| spawn_reader(pipe, stderr_buf.clone()));

        let mut timed_out = false;
        let mut cancelled = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => {
                    if let Some(limit) = timeout
                        && t0.elapsed() >= limit
                    {
                        timed_out = true;
                        terminate_gracefully(&mut child);
                        break child.wait();
                    }
                    if let Some(token) = cancel
                        && token.is_cancelled()
                    {
                        cancelled = true;
                        terminate_gracefully(&mut child);
                        break child.wait();
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => break Err(e),
            }
        };

        let duration = t0.elapsed();
        let status = status.map_err(|e| CommandError {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            exit_code: None,
            stderr: Some(e.to_string()),
        })?;

        if let Some(h) = stdout_handle {
            let _ = h.join();
        }
        if let Some(h) = stderr_handle {
            let _ = h.join();
        }
        let stdout = Arc::try_unwrap(stdout_buf).map(|m| m.into_inner().unwrap()).unwrap_or_default();
        let stderr = Arc::try_unwrap(stderr_buf).map(|m| m.into_inner().unwrap()).unwrap_or_default();

        log::debug!(
            "[trace] cmd=\"{cmd_str}\" dur={:.1}ms ok={} timed_out={timed_out} cancelled={cancelled}",
            duration.as_secs_f64() * 1000.0,
            status.code() == Some(0) && !timed_out && !cancelled,
        );

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            timed_out,
            cancelled,
            duration,
        })
    }
}

/// Spawn a thread that copies every line from `pipe` into `buf`, line by
/// line, so the child never blocks writing to a full OS pipe buffer while
/// the parent is elsewhere (e.g. polling `try_wait`).
fn spawn_reader(pipe: impl std::io::Read + Send + 'static, buf: Arc<Mutex<String>>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines().map_while(Result::ok) {
            let mut guard = buf.lock().unwrap();
            if !guard.is_empty() {
                guard.push('\n');
            }
            guard.push_str(&line);
        }
    })
}

/// Send a graceful termination signal; escalate to a forced kill if the
/// child hasn't exited within [`GRACEFUL_SHUTDOWN_GRACE`].
fn terminate_gracefully(child: &mut std::process::Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;
        let pid = Pid::from_raw(child.id() as i32);
        let _ = signal::kill(pid, Signal::SIGTERM);
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }

    if child.wait_timeout(GRACEFUL_SHUTDOWN_GRACE).ok().flatten().is_none() {
        let _ = child.kill();
    }
}
