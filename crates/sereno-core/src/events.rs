//! Typed event bus connecting the supervisor to its observers.
//!
//! The desktop shell has several independently-rendered surfaces (main
//! window, tray menu) that both issue commands and render state. They talk
//! through this bus instead of holding references to each other. The topic
//! set is closed: subscribers pattern-match exhaustively on [`DaemonEvent`].
//!
//! Delivery is at-least-once to every current subscriber, and deliveries to
//! a single subscriber arrive in publish order. Subscribers are expected to
//! be idempotent. A bounded replay window lets late subscribers catch up.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};

use crate::state::DaemonState;

/// Monotonic sequence number assigned at publish time.
pub type EventSeq = u64;

/// Events carried on the bus.
///
/// The `*Requested` variants are commands from observers to the supervisor;
/// the rest are broadcasts from the supervisor back out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonEvent {
    /// An observer asked for the daemon to be started.
    #[serde(rename = "daemon-start-requested")]
    StartRequested,
    /// An observer asked for the daemon to be stopped.
    #[serde(rename = "daemon-stop-requested")]
    StopRequested,
    /// An observer asked for a stop-then-start cycle.
    #[serde(rename = "daemon-restart-requested")]
    RestartRequested,
    /// The daemon was confirmed running.
    #[serde(rename = "daemon-started")]
    Started {
        /// Confirmed process id.
        pid: u32,
    },
    /// The daemon is gone.
    #[serde(rename = "daemon-stopped")]
    Stopped,
    /// The observable state changed.
    #[serde(rename = "status-updated")]
    StatusUpdated {
        /// Snapshot taken after the mutation.
        state: DaemonState,
    },
    /// A lifecycle operation failed; details are in the log as well.
    #[serde(rename = "daemon-error")]
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl DaemonEvent {
    /// The wire name of this event's topic.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::StartRequested => "daemon-start-requested",
            Self::StopRequested => "daemon-stop-requested",
            Self::RestartRequested => "daemon-restart-requested",
            Self::Started { .. } => "daemon-started",
            Self::Stopped => "daemon-stopped",
            Self::StatusUpdated { .. } => "status-updated",
            Self::Error { .. } => "daemon-error",
        }
    }

    /// Returns true for the command variants consumed by the supervisor.
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::StartRequested | Self::StopRequested | Self::RestartRequested
        )
    }
}

/// Publish/subscribe channel for [`DaemonEvent`]s.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an event to all current subscribers, returning its sequence
    /// number.
    async fn publish(&self, event: DaemonEvent) -> EventSeq;

    /// Registers a new subscriber. Only events published after this call are
    /// delivered; use [`EventBus::events_since`] to backfill.
    fn subscribe(&self) -> broadcast::Receiver<(EventSeq, DaemonEvent)>;

    /// Returns retained events with a sequence number greater than `seq`.
    /// The replay window is bounded, so very old events may be gone.
    async fn events_since(&self, seq: EventSeq) -> Vec<(EventSeq, DaemonEvent)>;

    /// Sequence number of the most recently published event, zero if none.
    fn current_seq(&self) -> EventSeq;
}

/// In-process [`EventBus`] over a tokio broadcast channel.
pub struct BroadcastBus {
    /// Replay ring, oldest first.
    retained: RwLock<VecDeque<(EventSeq, DaemonEvent)>>,
    /// Bounded size of the replay ring.
    replay_capacity: usize,
    /// Last assigned sequence number.
    last_seq: AtomicU64,
    /// Live fan-out channel.
    tx: broadcast::Sender<(EventSeq, DaemonEvent)>,
}

impl BroadcastBus {
    /// Default live-channel capacity per subscriber.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;
    /// Default replay-window size.
    pub const DEFAULT_REPLAY_CAPACITY: usize = 256;

    /// Creates a bus with default capacities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CHANNEL_CAPACITY, Self::DEFAULT_REPLAY_CAPACITY)
    }

    /// Creates a bus with explicit channel and replay capacities.
    #[must_use]
    pub fn with_capacity(channel: usize, replay: usize) -> Self {
        let (tx, _rx) = broadcast::channel(channel.max(1));
        Self {
            retained: RwLock::new(VecDeque::with_capacity(replay)),
            replay_capacity: replay.max(1),
            last_seq: AtomicU64::new(0),
            tx,
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for BroadcastBus {
    async fn publish(&self, event: DaemonEvent) -> EventSeq {
        let mut retained = self.retained.write().await;
        let seq = self.last_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if retained.len() >= self.replay_capacity {
            retained.pop_front();
        }
        retained.push_back((seq, event.clone()));
        drop(retained);

        tracing::trace!(seq = seq, topic = event.topic(), "published event");
        // A send error only means there are no subscribers right now; the
        // event is still retained for replay.
        let _ = self.tx.send((seq, event));
        seq
    }

    fn subscribe(&self) -> broadcast::Receiver<(EventSeq, DaemonEvent)> {
        self.tx.subscribe()
    }

    async fn events_since(&self, seq: EventSeq) -> Vec<(EventSeq, DaemonEvent)> {
        self.retained
            .read()
            .await
            .iter()
            .filter(|(s, _)| *s > seq)
            .cloned()
            .collect()
    }

    fn current_seq(&self) -> EventSeq {
        self.last_seq.load(Ordering::SeqCst)
    }
}
