//! Core types for daemon supervision.
//!
//! The supervised daemon is an external binary that detaches into the
//! background, so it is identified by process-table inspection rather than
//! a parent-child handle. These types model that identity and the explicit
//! lifecycle state machine built on top of it.

use serde::{Deserialize, Serialize};

/// Daemon lifecycle phase.
///
/// The machine is cyclic, there is no terminal state:
/// ```text
/// Stopped → Starting → Running → Stopping → Stopped → ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DaemonPhase {
    /// No daemon process is believed to exist.
    #[default]
    Stopped,
    /// Launch issued, waiting for the process to appear in the table.
    Starting,
    /// Process located and confirmed alive.
    Running,
    /// Escalation sequence in progress.
    Stopping,
}

impl DaemonPhase {
    /// Returns true while a transition is underway.
    #[must_use]
    pub const fn is_transitional(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }

    /// Returns true if the daemon is believed alive (a pid should be held).
    #[must_use]
    pub const fn expects_pid(&self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }
}

impl std::fmt::Display for DaemonPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        write!(f, "{s}")
    }
}

/// A process found in the OS process table.
///
/// `start_time` is the process start in UNIX seconds, taken from the table
/// at locate time, so uptime can be derived without extra bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    /// OS process identifier.
    pub pid: u32,
    /// Process start time, UNIX seconds. Zero when the table did not report one.
    pub start_time: u64,
}

impl ProcessDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(pid: u32, start_time: u64) -> Self {
        Self { pid, start_time }
    }

    /// Seconds the process has been alive as of `now` (UNIX seconds).
    #[must_use]
    pub const fn uptime(&self, now: u64) -> u64 {
        now.saturating_sub(self.start_time)
    }

    /// Seconds the process has been alive as of the current wall clock.
    #[must_use]
    pub fn uptime_now(&self) -> u64 {
        self.uptime(unix_now())
    }
}

/// Termination signals used by the escalation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopSignal {
    /// SIGINT, the polite request.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// SIGKILL, cannot be ignored.
    Kill,
}

impl StopSignal {
    /// Returns the Unix signal number.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        match self {
            Self::Interrupt => 2,
            Self::Terminate => 15,
            Self::Kill => 9,
        }
    }

    /// Creates a signal from a Unix signal number.
    #[must_use]
    pub const fn from_i32(sig: i32) -> Option<Self> {
        match sig {
            2 => Some(Self::Interrupt),
            15 => Some(Self::Terminate),
            9 => Some(Self::Kill),
            _ => None,
        }
    }
}

impl std::fmt::Display for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Kill => "SIGKILL",
        };
        write!(f, "{s}")
    }
}

/// One step of the stop escalation: send a signal, then wait before the
/// next liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopStep {
    /// Signal to deliver.
    pub signal: StopSignal,
    /// Grace period after delivery.
    #[serde(with = "crate::config::humantime_serde")]
    pub wait_after: std::time::Duration,
}

impl StopStep {
    /// Creates a step.
    #[must_use]
    pub const fn new(signal: StopSignal, wait_after: std::time::Duration) -> Self {
        Self { signal, wait_after }
    }
}

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal operation.
    Info,
    /// Something odd but recoverable.
    Warn,
    /// An operation failed.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// An entry in the bounded supervisor log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// UNIX seconds at append time.
    pub timestamp: u64,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
}

impl LogEntry {
    /// Creates an entry stamped with the current wall clock.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: unix_now(),
            level,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Current wall clock as UNIX seconds.
#[must_use]
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
