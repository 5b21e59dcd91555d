//! Sereno: daemon process supervision for desktop shells.
//!
//! Wraps a long-lived network daemon (i2pd) behind a typed lifecycle:
//! locate it in the process table, start and stop it with escalating
//! signals, poll its status, and run its companion tools.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sereno::prelude::*;
//!
//! # async fn demo() -> sereno::core::Result<()> {
//! sereno::telemetry::init();
//!
//! let bus = Arc::new(BroadcastBus::default());
//! let supervisor = DaemonSupervisor::new(SupervisorConfig::default(), bus)?;
//! supervisor.bootstrap().await?;
//! supervisor.start().await?;
//! # Ok(())
//! # }
//! ```

pub use sereno_core as core;
pub use sereno_tools as tools;

/// Prelude module for common imports.
pub mod prelude {
    pub use sereno_core::{
        BroadcastBus, DaemonEvent, DaemonPhase, DaemonState, DaemonSupervisor, EventBus,
        StateStore, SupervisorConfig, SupervisorError,
    };
    pub use sereno_tools::{ToolInvocation, ToolKind, ToolOutput, ToolRunner, ToolsConfig};
}

/// Opt-in tracing setup for binaries embedding the supervisor.
pub mod telemetry {
    use tracing_subscriber::EnvFilter;

    /// Installs a formatted subscriber honoring `RUST_LOG`, defaulting
    /// to `info`. Safe to call more than once; later calls are no-ops.
    pub fn init() {
        let _ = try_init();
    }

    /// Like [`init`] but surfaces the failure when a global subscriber
    /// is already installed.
    ///
    /// # Errors
    /// Returns an error when another subscriber is already set.
    pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    }
}
