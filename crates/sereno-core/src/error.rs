//! Error types for sereno-core.
//!
//! Every failure mode of the supervisor is explicit. All of these are
//! recovered at the supervisor boundary: state and log are updated, an
//! error event is broadcast, and the error is returned to the caller.

use std::path::PathBuf;

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Failure modes of daemon supervision.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The daemon executable was not found at any search location.
    #[error("daemon executable not found ({} locations searched)", searched.len())]
    ExecutableNotFound {
        /// Every path that was checked, in search order.
        searched: Vec<PathBuf>,
    },

    /// Another lifecycle operation holds the guard. Informational, not a
    /// fault: the command was rejected, not queued.
    #[error("operation in progress, {0} rejected")]
    Busy(&'static str),

    /// The process-table query itself failed. Status is unknown; callers
    /// must not treat this as "daemon stopped".
    #[error("process query failed: {0}")]
    QueryFailed(String),

    /// The escalation sequence was exhausted and the process is still alive.
    #[error("daemon still alive after full escalation (pid {pid})")]
    StopIncomplete {
        /// The surviving process.
        pid: u32,
    },

    /// OS-level failure to spawn the daemon, or the spawned daemon never
    /// appeared in the process table.
    #[error("launch failed: {0}")]
    LaunchFailed(String),

    /// Signal delivery failed.
    #[error("signal error: {0}")]
    Signal(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a process-query error.
    #[must_use]
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Creates a launch error.
    #[must_use]
    pub fn launch_failed(msg: impl Into<String>) -> Self {
        Self::LaunchFailed(msg.into())
    }

    /// Creates a signal-delivery error.
    #[must_use]
    pub fn signal(msg: impl Into<String>) -> Self {
        Self::Signal(msg.into())
    }

    /// Returns true if this is a busy rejection rather than a fault.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Returns true if a later retry can succeed without code changes
    /// (user installs the binary, the contending operation finishes, the
    /// process table becomes readable again).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Busy(_)
                | Self::QueryFailed(_)
                | Self::StopIncomplete { .. }
                | Self::ExecutableNotFound { .. }
        )
    }
}
