//! Tool process execution.
//!
//! [`ToolRunner`] spawns one companion tool per run with captured stdio,
//! a wall-clock limit, and ordered shutdown: terminate first, wait out a
//! short grace period, then force-kill. Every child is reaped on every
//! path, including timeout and cancellation, so a finished run never
//! leaves a process behind.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::catalog::ToolKind;
use crate::config::ToolsConfig;
use crate::error::{Result, ToolError};

/// Identifier for one tool run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A prepared tool invocation, built up fluently.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    tool: ToolKind,
    args: Vec<String>,
    stdin: Option<String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolInvocation {
    /// Starts an invocation of `tool` with no arguments.
    #[must_use]
    pub fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            args: Vec::new(),
            stdin: None,
            working_dir: None,
            timeout: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feeds `input` to the tool's stdin.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Runs the tool in `dir` instead of the configured default.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Overrides the configured time limit for this run.
    #[must_use]
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// The tool this invocation runs.
    #[must_use]
    pub const fn tool(&self) -> ToolKind {
        self.tool
    }
}

/// How a tool process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    /// True for a zero exit code.
    pub success: bool,
    /// Exit code, absent when the process was signaled.
    pub code: Option<i32>,
    /// Terminating signal number, unix only.
    pub signal: Option<i32>,
}

impl ExitInfo {
    fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            success: status.success(),
            code: status.code(),
            signal,
        }
    }
}

/// Captured output of a finished tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Everything the tool wrote to stdout.
    pub stdout: String,
    /// Everything the tool wrote to stderr.
    pub stderr: String,
    /// Exit details.
    pub exit: ExitInfo,
}

impl ToolOutput {
    /// Stdout and stderr joined for display.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
            (false, true) => self.stdout.clone(),
            _ => self.stderr.clone(),
        }
    }
}

struct ActiveRun {
    pid: u32,
    tool: ToolKind,
}

/// Runs companion tools with output capture and a hard time limit.
pub struct ToolRunner {
    config: ToolsConfig,
    active: parking_lot::Mutex<HashMap<RunId, ActiveRun>>,
}

impl ToolRunner {
    /// Creates a runner over the given configuration.
    #[must_use]
    pub fn new(config: ToolsConfig) -> Self {
        Self {
            config,
            active: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    /// Runs currently in flight.
    #[must_use]
    pub fn active_runs(&self) -> Vec<(RunId, ToolKind)> {
        self.active
            .lock()
            .iter()
            .map(|(id, run)| (*id, run.tool))
            .collect()
    }

    /// Runs a tool to completion under a fresh run id.
    ///
    /// # Errors
    /// Returns [`ToolError::NotFound`] when the executable is missing,
    /// [`ToolError::LaunchFailed`] when it cannot be spawned, and
    /// [`ToolError::Timeout`] when the run exceeds its limit and is
    /// terminated.
    pub async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        self.run_with_id(RunId::new(), invocation).await
    }

    /// Runs a tool under a caller-chosen id so another task can cancel it.
    ///
    /// # Errors
    /// Same as [`ToolRunner::run`].
    pub async fn run_with_id(&self, id: RunId, invocation: ToolInvocation) -> Result<ToolOutput> {
        let executable = self.config.resolve(invocation.tool)?;
        let cwd = invocation
            .working_dir
            .clone()
            .or_else(|| self.config.working_dir.clone())
            .or_else(dirs_next::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut child = Command::new(&executable)
            .args(&invocation.args)
            .current_dir(&cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::launch_failed(format!("{}: {e}", executable.display()))
            })?;

        if let Some(pid) = child.id() {
            self.active.lock().insert(
                id,
                ActiveRun {
                    pid,
                    tool: invocation.tool,
                },
            );
        }
        tracing::info!(id = %id, tool = %invocation.tool, "tool run started");

        // Readers must be in place before stdin is fed, or a chatty tool
        // could fill its output pipe while we are still writing input
        let stdout_task = drain(child.stdout.take());
        let stderr_task = drain(child.stderr.take());

        if let Some(mut sink) = child.stdin.take() {
            if let Some(input) = &invocation.stdin {
                // A tool may exit without draining its input; the exit
                // status tells that story
                let _ = sink.write_all(input.as_bytes()).await;
            }
            drop(sink);
        }

        let limit = invocation.timeout.unwrap_or(self.config.timeout);
        let status = match tokio::time::timeout(limit, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                self.active.lock().remove(&id);
                return Err(ToolError::Io(e));
            }
            Err(_) => {
                tracing::warn!(id = %id, tool = %invocation.tool, "tool run exceeded its time limit");
                self.end_child(child).await;
                self.active.lock().remove(&id);
                return Err(ToolError::Timeout {
                    tool: invocation.tool.executable_name().to_string(),
                    limit,
                });
            }
        };
        self.active.lock().remove(&id);

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        tracing::debug!(id = %id, code = ?status.code(), "tool run finished");

        Ok(ToolOutput {
            stdout,
            stderr,
            exit: ExitInfo::from_status(status),
        })
    }

    /// Cancels an in-flight run: terminate, grace, force-kill.
    ///
    /// Returns false when no run with that id is in flight. The owning
    /// [`ToolRunner::run_with_id`] call observes the death and reaps the
    /// process.
    pub async fn cancel(&self, id: RunId) -> bool {
        let Some((pid, tool)) = self.active.lock().get(&id).map(|r| (r.pid, r.tool)) else {
            return false;
        };
        tracing::info!(id = %id, tool = %tool, "cancelling tool run");
        #[cfg(unix)]
        {
            deliver(pid, nix::sys::signal::Signal::SIGTERM);
            tokio::time::sleep(self.config.cancel_grace).await;
            if self.active.lock().contains_key(&id) && process_alive(pid) {
                deliver(pid, nix::sys::signal::Signal::SIGKILL);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = pid;
            tracing::warn!(id = %id, "cancellation is only supported on unix");
        }
        true
    }

    /// Cancels every in-flight run and returns how many were cancelled.
    pub async fn cancel_all(&self) -> usize {
        let ids: Vec<RunId> = self.active.lock().keys().copied().collect();
        let mut cancelled = 0;
        for id in ids {
            if self.cancel(id).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Ends a timed-out child: terminate, wait out the grace period,
    /// force-kill if it is still there. Reaps on every path.
    async fn end_child(&self, mut child: Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            deliver(pid, nix::sys::signal::Signal::SIGTERM);
            if tokio::time::timeout(self.config.cancel_grace, child.wait())
                .await
                .is_ok()
            {
                return;
            }
        }
        let _ = child.kill().await;
    }
}

fn drain(pipe: Option<impl AsyncRead + Unpin + Send + 'static>) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(unix)]
#[allow(clippy::cast_possible_wrap)]
fn deliver(pid: u32, signal: nix::sys::signal::Signal) {
    let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal);
}

#[cfg(unix)]
#[allow(clippy::cast_possible_wrap)]
fn process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}
