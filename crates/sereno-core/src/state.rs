//! Observable daemon state and the store that owns it.
//!
//! [`StateStore`] is the single place state is mutated. Every state mutation
//! is followed by a [`DaemonEvent::StatusUpdated`] broadcast so observers
//! never need to poll the store. The bounded log ring is part of the store
//! as well; log appends go to the ring and to `tracing`, and observers read
//! the ring through the store handle (the closed topic set carries no log
//! events).

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::events::{DaemonEvent, EventBus};
use crate::stats::StatSample;
use crate::types::{DaemonPhase, LogEntry, LogLevel};

/// The observable state record.
///
/// `process_id` is `Some` exactly while the phase says a process should
/// exist; uptime and all counters are zeroed whenever the phase enters
/// [`DaemonPhase::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DaemonState {
    /// Lifecycle phase.
    pub phase: DaemonPhase,
    /// Pid from the last successful locate, while the phase expects one.
    pub process_id: Option<u32>,
    /// Seconds the daemon has been up.
    pub uptime_seconds: u64,
    /// Bytes received by the daemon.
    pub bytes_received: u64,
    /// Bytes sent by the daemon.
    pub bytes_sent: u64,
    /// Active tunnels.
    pub active_tunnels: u32,
    /// Known peers.
    pub peer_count: u32,
}

impl DaemonState {
    /// Resets to the initial stopped record: phase Stopped, no pid, all
    /// counters zero.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Applies an auxiliary statistics sample.
    pub fn apply_sample(&mut self, sample: StatSample) {
        self.bytes_received = sample.bytes_received;
        self.bytes_sent = sample.bytes_sent;
        self.active_tunnels = sample.active_tunnels;
        self.peer_count = sample.peer_count;
    }

    /// Returns true if the pid field is consistent with the phase.
    #[must_use]
    pub const fn pid_consistent(&self) -> bool {
        self.phase.expects_pid() == self.process_id.is_some()
    }
}

/// Owner of [`DaemonState`] and the bounded log ring.
///
/// Created once at application start and injected into the supervisor and
/// every observer; dropped at application exit.
pub struct StateStore {
    state: RwLock<DaemonState>,
    logs: Mutex<VecDeque<LogEntry>>,
    log_capacity: usize,
    bus: Arc<dyn EventBus>,
}

impl StateStore {
    /// Creates a store broadcasting on `bus`, retaining at most
    /// `log_capacity` log entries.
    #[must_use]
    pub fn new(log_capacity: usize, bus: Arc<dyn EventBus>) -> Self {
        Self {
            state: RwLock::new(DaemonState::default()),
            logs: Mutex::new(VecDeque::with_capacity(log_capacity.max(1))),
            log_capacity: log_capacity.max(1),
            bus,
        }
    }

    /// Current state, by value.
    #[must_use]
    pub fn snapshot(&self) -> DaemonState {
        *self.state.read()
    }

    /// Mutates the state and broadcasts the resulting snapshot.
    ///
    /// The mutation runs under the write lock; the broadcast happens after
    /// the lock is released.
    pub async fn update<F>(&self, mutate: F) -> DaemonState
    where
        F: FnOnce(&mut DaemonState) + Send,
    {
        let snapshot = {
            let mut state = self.state.write();
            mutate(&mut state);
            *state
        };
        self.bus
            .publish(DaemonEvent::StatusUpdated { state: snapshot })
            .await;
        snapshot
    }

    /// Appends a log entry, dropping the oldest on overflow, and mirrors it
    /// to `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        match level {
            LogLevel::Debug => tracing::debug!("{}", entry.message),
            LogLevel::Info => tracing::info!("{}", entry.message),
            LogLevel::Warn => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
        }
        let mut logs = self.logs.lock();
        if logs.len() >= self.log_capacity {
            logs.pop_front();
        }
        logs.push_back(entry);
    }

    /// Retained log entries, oldest first.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().iter().cloned().collect()
    }

    /// Number of retained log entries.
    #[must_use]
    pub fn log_count(&self) -> usize {
        self.logs.lock().len()
    }

    /// Empties the log ring.
    pub fn clear_logs(&self) {
        self.logs.lock().clear();
    }

    /// Returns true if any retained entry contains `needle`.
    #[must_use]
    pub fn log_contains(&self, needle: &str) -> bool {
        self.logs.lock().iter().any(|e| e.message.contains(needle))
    }
}
