//! Process location via OS process-table inspection.
//!
//! The daemon detaches into the background on launch, so the supervisor
//! never holds a parent-child handle to it. Presence and identity are
//! instead confirmed by scanning the process table for a command line that
//! names the binary and its daemon flag, excluding the supervising process
//! itself. The scan is read-only and idempotent.
//!
//! A failed scan is reported as [`SupervisorError::QueryFailed`], which is
//! distinct from "no daemon found": callers must never treat an unreadable
//! table as a stopped daemon.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::types::ProcessDescriptor;

/// What to look for in the process table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpec {
    /// Binary name that must appear in the command line.
    pub binary_name: String,
    /// Daemon-mode flag that must also appear.
    pub daemon_flag: String,
    /// Exclude the supervising process itself from matches.
    pub exclude_self: bool,
}

impl MatchSpec {
    /// Creates a spec with self-exclusion on.
    #[must_use]
    pub fn new(binary_name: impl Into<String>, daemon_flag: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            daemon_flag: daemon_flag.into(),
            exclude_self: true,
        }
    }

    /// Builds the match spec for the configured daemon.
    #[must_use]
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(&config.binary_name, &config.daemon_flag)
    }

    /// Returns true if a command line names both the binary and the flag.
    #[must_use]
    pub fn matches_cmdline(&self, cmdline: &str) -> bool {
        cmdline.contains(&self.binary_name) && cmdline.contains(&self.daemon_flag)
    }
}

/// Queries the process table for the supervised daemon.
#[async_trait]
pub trait ProcessLocator: Send + Sync {
    /// Returns the matching process, or `None` when no daemon is running.
    ///
    /// # Errors
    /// Returns [`SupervisorError::QueryFailed`] if the table could not be
    /// read; status is then unknown.
    async fn locate(&self, spec: &MatchSpec) -> Result<Option<ProcessDescriptor>>;

    /// Re-confirms that `pid` still exists and still matches `spec`.
    ///
    /// Used before every signal delivery so a recycled pid is never
    /// signaled. The default goes through a full [`ProcessLocator::locate`].
    ///
    /// # Errors
    /// Returns [`SupervisorError::QueryFailed`] if the table could not be
    /// read.
    async fn confirm(&self, spec: &MatchSpec, pid: u32) -> Result<bool> {
        Ok(self.locate(spec).await?.map(|d| d.pid) == Some(pid))
    }
}

/// Production locator over a sysinfo process-table snapshot.
///
/// Scans run on the blocking thread pool; the table read itself is the
/// blocking part.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLocator;

impl TableLocator {
    /// Creates a locator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLocator for TableLocator {
    async fn locate(&self, spec: &MatchSpec) -> Result<Option<ProcessDescriptor>> {
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || scan_table(&spec))
            .await
            .map_err(|e| SupervisorError::query_failed(format!("process scan failed: {e}")))
    }

    async fn confirm(&self, spec: &MatchSpec, pid: u32) -> Result<bool> {
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || {
            let sys = fresh_table();
            sys.process(Pid::from_u32(pid))
                .is_some_and(|p| spec.matches_cmdline(&cmdline_of(p)))
        })
        .await
        .map_err(|e| SupervisorError::query_failed(format!("process check failed: {e}")))
    }
}

/// Snapshot of the process table with command lines populated.
fn fresh_table() -> System {
    System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::everything()),
    )
}

/// Full joined command line, falling back to the process name.
fn cmdline_of(process: &sysinfo::Process) -> String {
    let cmd = process.cmd();
    if cmd.is_empty() {
        process.name().to_string_lossy().into_owned()
    } else {
        cmd.iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Blocking scan. Oldest match wins so a long-lived daemon is preferred
/// over any short-lived wrapper that briefly matches the same pattern.
fn scan_table(spec: &MatchSpec) -> Option<ProcessDescriptor> {
    let sys = fresh_table();
    let own_pid = std::process::id();
    let own_name = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));

    let mut best: Option<ProcessDescriptor> = None;
    for (pid, process) in sys.processes() {
        let pid = pid.as_u32();
        if spec.exclude_self {
            if pid == own_pid {
                continue;
            }
            let name = process.name().to_string_lossy();
            if own_name.as_deref() == Some(name.as_ref()) {
                continue;
            }
        }
        if !spec.matches_cmdline(&cmdline_of(process)) {
            continue;
        }
        let candidate = ProcessDescriptor::new(pid, process.start_time());
        let replace = best.is_none_or(|cur| {
            (candidate.start_time, candidate.pid) < (cur.start_time, cur.pid)
        });
        if replace {
            best = Some(candidate);
        }
    }
    best
}
