//! Periodic status polling while the daemon runs.
//!
//! The poller holds only a [`Weak`] reference to the supervisor so it can
//! never keep it alive, and it exits on its own when the supervisor is
//! dropped, when the daemon leaves the running phase, or when cancelled.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::supervisor::DaemonSupervisor;
use crate::types::DaemonPhase;

/// Spawns the recurring poll task.
pub struct StatusPoller;

impl StatusPoller {
    /// Starts polling `supervisor` every `interval`.
    ///
    /// The first pass runs immediately; later passes follow the interval,
    /// skipping missed ticks instead of bunching them up.
    #[must_use]
    pub fn spawn(supervisor: Weak<DaemonSupervisor>, interval: Duration) -> PollerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let Some(sup) = supervisor.upgrade() else { break };
                        sup.poll_tick().await;
                        if sup.status().phase != DaemonPhase::Running {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("status poller stopped");
        });
        PollerHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Handle to a running poll task.
///
/// Dropping the handle also stops the task; the closed stop channel is
/// observed on the next loop turn.
#[derive(Debug)]
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signals the task to stop without waiting for it.
    pub fn cancel(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Returns true once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
