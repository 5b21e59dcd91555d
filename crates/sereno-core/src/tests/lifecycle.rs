//! Category A: lifecycle falsification tests (F001-F010).
//!
//! Each test tries to falsify one lifecycle guarantee: phase transitions,
//! adoption instead of duplicate spawns, no-op stops, counter resets, and
//! recovery to a stable phase after every failure.

use crate::error::SupervisorError;
use crate::events::DaemonEvent;
use crate::tests::harness::TestRig;
use crate::types::{DaemonPhase, StopSignal};

/// F001: A fresh start walks stopped, starting, running and announces
/// the daemon exactly once
#[tokio::test]
async fn f001_fresh_start_walks_phases_in_order() {
    let rig = TestRig::new();
    assert_eq!(rig.supervisor.status().phase, DaemonPhase::Stopped);

    rig.supervisor.start().await.unwrap();

    let state = rig.supervisor.status();
    assert_eq!(state.phase, DaemonPhase::Running);
    assert!(state.process_id.is_some());
    assert_eq!(rig.launcher.launch_count(), 1);

    let phases: Vec<DaemonPhase> = rig
        .events()
        .await
        .iter()
        .filter_map(|e| match e {
            DaemonEvent::StatusUpdated { state } => Some(state.phase),
            _ => None,
        })
        .collect();
    let starting = phases.iter().position(|p| *p == DaemonPhase::Starting);
    let running = phases.iter().position(|p| *p == DaemonPhase::Running);
    assert!(starting.is_some(), "starting phase was never broadcast");
    assert!(running.is_some(), "running phase was never broadcast");
    assert!(starting < running, "starting must precede running");

    assert_eq!(rig.count_topic("daemon-started").await, 1);
}

/// F002: A missing executable fails the start and leaves the phase stopped
#[tokio::test]
async fn f002_missing_executable_leaves_stopped() {
    let rig = TestRig::with_launcher(super::mocks::MockLauncher::with_missing_executable);

    let err = rig.supervisor.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::ExecutableNotFound { .. }));

    assert_eq!(rig.supervisor.status().phase, DaemonPhase::Stopped);
    assert_eq!(rig.launcher.launch_count(), 0);
    assert_eq!(rig.count_topic("daemon-error").await, 1);
    assert!(rig.store.log_contains("start failed"));
}

/// F003: Starting over an already running daemon adopts it without
/// spawning a second process
#[tokio::test]
async fn f003_start_adopts_existing_daemon() {
    let rig = TestRig::new();
    rig.table.insert(4242);

    rig.supervisor.start().await.unwrap();

    let state = rig.supervisor.status();
    assert_eq!(state.phase, DaemonPhase::Running);
    assert_eq!(state.process_id, Some(4242));
    assert_eq!(rig.launcher.launch_count(), 0);
    assert_eq!(rig.count_topic("daemon-started").await, 1);
    assert!(rig.store.log_contains("already running"));
}

/// F004: Stopping an absent daemon is a successful no-op that sends no
/// signal
#[tokio::test]
async fn f004_stop_without_daemon_is_noop() {
    let rig = TestRig::new();

    rig.supervisor.stop().await.unwrap();

    assert_eq!(rig.supervisor.status().phase, DaemonPhase::Stopped);
    assert!(rig.sender.sent().is_empty());
    assert_eq!(rig.count_topic("daemon-stopped").await, 0);
    assert!(rig.store.log_contains("not running"));
}

/// F005: Leaving the running phase resets every traffic counter
#[tokio::test]
async fn f005_stop_clears_counters() {
    let rig = TestRig::new();
    rig.table.insert_aged(600, 120);
    rig.supervisor.refresh().await.unwrap();
    rig.supervisor.poll_tick().await;

    let running = rig.supervisor.status();
    assert!(running.uptime_seconds >= 120);
    assert!(running.peer_count > 0);
    assert!(running.bytes_received > 0);

    rig.table.dies_on(StopSignal::Interrupt);
    rig.supervisor.stop().await.unwrap();

    let stopped = rig.supervisor.status();
    assert_eq!(stopped.phase, DaemonPhase::Stopped);
    assert_eq!(stopped.process_id, None);
    assert_eq!(stopped.uptime_seconds, 0);
    assert_eq!(stopped.bytes_received, 0);
    assert_eq!(stopped.bytes_sent, 0);
    assert_eq!(stopped.active_tunnels, 0);
    assert_eq!(stopped.peer_count, 0);
}

/// F006: A restart whose stop half fails aborts without starting
#[tokio::test]
async fn f006_restart_aborts_when_stop_fails() {
    let rig = TestRig::new();
    // Survives every signal in the ladder
    rig.adopt(700).await;

    let err = rig.supervisor.restart().await.unwrap_err();
    assert!(matches!(err, SupervisorError::StopIncomplete { pid: 700 }));

    assert_eq!(rig.launcher.launch_count(), 0);
    assert_eq!(rig.supervisor.status().phase, DaemonPhase::Running);
    assert!(rig.store.log_contains("restart aborted"));
}

/// F007: A full restart stops the old process and starts a new one
#[tokio::test]
async fn f007_restart_replaces_daemon() {
    let rig = TestRig::new();
    rig.table.dies_on(StopSignal::Interrupt);
    rig.adopt(5001).await;

    rig.supervisor.restart().await.unwrap();

    let state = rig.supervisor.status();
    assert_eq!(state.phase, DaemonPhase::Running);
    assert_ne!(state.process_id, Some(5001));
    assert_eq!(rig.launcher.launch_count(), 1);
    assert_eq!(rig.count_topic("daemon-stopped").await, 1);
    assert_eq!(rig.count_topic("daemon-started").await, 1);
}

/// F008: Bootstrap adopts a daemon that was already running, without the
/// start announcement
#[tokio::test]
async fn f008_bootstrap_adopts_running_daemon() {
    let rig = TestRig::new();
    rig.table.insert(808);

    rig.supervisor.bootstrap().await.unwrap();

    let state = rig.supervisor.status();
    assert_eq!(state.phase, DaemonPhase::Running);
    assert_eq!(state.process_id, Some(808));
    assert!(rig.store.log_contains("detected running daemon"));
    assert_eq!(rig.count_topic("daemon-started").await, 0);
    rig.supervisor.shutdown();
}

/// F009: Start on a running supervisor never double-spawns
#[tokio::test]
async fn f009_repeated_start_spawns_once() {
    let rig = TestRig::new();

    rig.supervisor.start().await.unwrap();
    rig.supervisor.start().await.unwrap();
    rig.supervisor.start().await.unwrap();

    assert_eq!(rig.launcher.launch_count(), 1);
    assert_eq!(rig.supervisor.status().phase, DaemonPhase::Running);
    assert!(rig.store.log_contains("not spawning another"));
}

/// F010: A failed spawn recovers to stopped and releases the guard
#[tokio::test]
async fn f010_launch_failure_recovers_to_stopped() {
    let rig = TestRig::with_launcher(super::mocks::MockLauncher::fail_spawn);

    let err = rig.supervisor.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::LaunchFailed(_)));

    assert_eq!(rig.supervisor.status().phase, DaemonPhase::Stopped);
    assert!(!rig.supervisor.operation_in_progress());
    assert_eq!(rig.count_topic("daemon-error").await, 1);

    // The guard must admit the next operation
    rig.supervisor.stop().await.unwrap();
}
