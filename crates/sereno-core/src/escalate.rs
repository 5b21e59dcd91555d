//! Signal escalation for stopping the daemon.
//!
//! Stopping walks a fixed ladder (SIGINT, SIGTERM, SIGKILL by default),
//! sleeping after each signal to give the daemon time to exit. Before
//! every delivery the pid is re-confirmed against the process table, so a
//! signal is only ever sent to a freshly verified daemon process and never
//! to a recycled pid.

use std::sync::Arc;

use crate::error::Result;
use crate::locate::{MatchSpec, ProcessLocator};
use crate::state::StateStore;
use crate::types::{LogLevel, StopSignal, StopStep};

/// Result of a full escalation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The daemon is gone from the process table.
    Stopped,
    /// The pid survived every signal in the ladder.
    StillAlive(u32),
}

/// Delivers one signal to one process.
///
/// Split out from the escalator so tests can observe deliveries without
/// touching real processes.
pub trait SignalSender: Send + Sync {
    /// Sends `signal` to `pid`. A process that is already gone is not an
    /// error; the next confirmation pass will observe its absence.
    ///
    /// # Errors
    /// Returns [`crate::SupervisorError::Signal`] when delivery fails for
    /// a reason other than the process not existing.
    fn send(&self, pid: u32, signal: StopSignal) -> Result<()>;
}

/// Sends real signals through the kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelSignals;

impl KernelSignals {
    /// Creates a sender.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl SignalSender for KernelSignals {
    #[allow(clippy::cast_possible_wrap)]
    fn send(&self, pid: u32, signal: StopSignal) -> Result<()> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let sig = match signal {
            StopSignal::Interrupt => Signal::SIGINT,
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        };
        match signal::kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(crate::SupervisorError::signal(format!(
                "failed to send {signal} to pid {pid}: {e}"
            ))),
        }
    }
}

#[cfg(not(unix))]
impl SignalSender for KernelSignals {
    fn send(&self, _pid: u32, signal: StopSignal) -> Result<()> {
        Err(crate::SupervisorError::signal(format!(
            "{signal} delivery is not supported on this platform"
        )))
    }
}

/// Walks the signal ladder against a located daemon process.
pub struct SignalEscalator {
    locator: Arc<dyn ProcessLocator>,
    sender: Arc<dyn SignalSender>,
    store: Arc<StateStore>,
}

impl SignalEscalator {
    /// Creates an escalator over the given locator and sender.
    #[must_use]
    pub fn new(
        locator: Arc<dyn ProcessLocator>,
        sender: Arc<dyn SignalSender>,
        store: Arc<StateStore>,
    ) -> Self {
        Self {
            locator,
            sender,
            store,
        }
    }

    /// Runs the ladder against `pid`, one step at a time.
    ///
    /// Each step re-confirms the pid, sends its signal, then sleeps for the
    /// step's wait. If any confirmation finds the process gone, escalation
    /// ends early with [`StopOutcome::Stopped`]. After the final step one
    /// last confirmation decides the outcome.
    ///
    /// # Errors
    /// Propagates [`crate::SupervisorError::QueryFailed`] from confirmation
    /// and [`crate::SupervisorError::Signal`] from delivery; a failed query
    /// means the daemon's status is unknown and the ladder must not
    /// continue blind.
    pub async fn escalate(
        &self,
        spec: &MatchSpec,
        pid: u32,
        steps: &[StopStep],
    ) -> Result<StopOutcome> {
        for step in steps {
            if !self.locator.confirm(spec, pid).await? {
                self.store.log(
                    LogLevel::Info,
                    format!("daemon (pid {pid}) exited before {}", step.signal),
                );
                return Ok(StopOutcome::Stopped);
            }
            self.sender.send(pid, step.signal)?;
            self.store.log(
                LogLevel::Info,
                format!("sent {} to daemon (pid {pid})", step.signal),
            );
            tokio::time::sleep(step.wait_after).await;
        }

        if self.locator.confirm(spec, pid).await? {
            tracing::warn!(pid, "process survived full signal escalation");
            Ok(StopOutcome::StillAlive(pid))
        } else {
            Ok(StopOutcome::Stopped)
        }
    }
}
