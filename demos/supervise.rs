// Examples are allowed to use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Supervisor Demo
//!
//! Runs the full daemon lifecycle against a local i2pd install: adopt a
//! daemon already in the process table or start a fresh one, stream
//! lifecycle events, and stop the daemon on ctrl-c.
//!
//! # Usage
//!
//! ```bash
//! # Supervise the system i2pd
//! cargo run --example supervise
//!
//! # Watch only; never spawn a daemon
//! cargo run --example supervise -- --adopt-only
//! ```

use std::sync::Arc;

use sereno::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sereno::telemetry::init();
    let adopt_only = std::env::args().any(|arg| arg == "--adopt-only");

    let bus = Arc::new(BroadcastBus::default());
    let supervisor =
        DaemonSupervisor::new(SupervisorConfig::default(), Arc::clone(&bus) as Arc<dyn EventBus>)?;

    let mut events = bus.subscribe();
    tokio::spawn(async move {
        while let Ok((seq, event)) = events.recv().await {
            println!("#{seq} {}", event.topic());
        }
    });

    supervisor.bootstrap().await?;
    if supervisor.status().phase != DaemonPhase::Running {
        if adopt_only {
            println!("no daemon found, not starting one");
        } else {
            supervisor.start().await?;
        }
    }

    println!("supervising i2pd, ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    if supervisor.status().phase == DaemonPhase::Running {
        supervisor.stop().await?;
    }
    supervisor.shutdown();
    Ok(())
}
