//! Lifecycle supervision for an external network daemon.
//!
//! The daemon backgrounds itself on launch, so no parent-child handle
//! survives a start. Supervision therefore runs over the process table:
//! presence is confirmed by scanning for the daemon's command line, stops
//! escalate through a signal ladder with re-confirmation before every
//! delivery, and a recurring poll keeps stored state honest while the
//! daemon runs.
//!
//! State lives in an injected [`StateStore`] and every mutation is
//! broadcast on the [`EventBus`], so any number of observers can follow
//! along without polling the store.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sereno_core::{BroadcastBus, DaemonSupervisor, SupervisorConfig};
//!
//! # async fn run() -> sereno_core::Result<()> {
//! let bus = Arc::new(BroadcastBus::new());
//! let supervisor = DaemonSupervisor::new(SupervisorConfig::default(), bus)?;
//! supervisor.bootstrap().await?;
//! supervisor.start().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

pub mod config;
pub mod error;
pub mod escalate;
pub mod events;
pub mod launch;
pub mod locate;
pub mod poll;
pub mod state;
pub mod stats;
pub mod supervisor;
#[cfg(test)]
mod tests;
pub mod types;

pub use config::SupervisorConfig;
pub use error::{Result, SupervisorError};
pub use escalate::{KernelSignals, SignalEscalator, SignalSender, StopOutcome};
pub use events::{BroadcastBus, DaemonEvent, EventBus, EventSeq};
pub use launch::{DaemonLauncher, ProcessLauncher, resolve_executable};
pub use locate::{MatchSpec, ProcessLocator, TableLocator};
pub use poll::{PollerHandle, StatusPoller};
pub use state::{DaemonState, StateStore};
pub use stats::{ModeledStats, StatSample, StatsSource};
pub use supervisor::{DaemonSupervisor, OperationGuard, OperationPermit};
pub use types::{
    DaemonPhase, LogEntry, LogLevel, ProcessDescriptor, StopSignal, StopStep, unix_now,
};
