//! Daemon lifecycle supervision.
//!
//! [`DaemonSupervisor`] owns the cyclic lifecycle (stopped, starting,
//! running, stopping) of one external daemon process. All lifecycle
//! operations funnel through an [`OperationGuard`] that admits at most one
//! in-flight operation; a second command arriving while one runs is
//! rejected with a notice rather than queued.
//!
//! Every state change goes through the shared [`StateStore`], which
//! broadcasts a status event after each mutation, so observers never see a
//! silent transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::escalate::{KernelSignals, SignalEscalator, SignalSender, StopOutcome};
use crate::events::{DaemonEvent, EventBus};
use crate::launch::{DaemonLauncher, ProcessLauncher};
use crate::locate::{MatchSpec, ProcessLocator, TableLocator};
use crate::poll::{PollerHandle, StatusPoller};
use crate::state::{DaemonState, StateStore};
use crate::stats::{ModeledStats, StatsSource};
use crate::types::{DaemonPhase, LogEntry, LogLevel, ProcessDescriptor};

/// Admission control for lifecycle operations.
///
/// Holds a single flag; acquiring yields a permit that releases the flag
/// on drop, so every exit path of an operation releases it.
#[derive(Debug, Default)]
pub struct OperationGuard {
    busy: AtomicBool,
}

impl OperationGuard {
    /// Creates a released guard.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Attempts to admit operation `op`.
    ///
    /// # Errors
    /// Returns [`SupervisorError::Busy`] naming `op` when another
    /// operation holds the permit.
    pub fn try_acquire(&self, op: &'static str) -> Result<OperationPermit<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(OperationPermit { guard: self })
        } else {
            Err(SupervisorError::Busy(op))
        }
    }

    /// Returns true while an operation holds the permit.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Exclusive permission to run one lifecycle operation.
#[derive(Debug)]
pub struct OperationPermit<'a> {
    guard: &'a OperationGuard,
}

impl Drop for OperationPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

/// Supervises one external daemon process.
pub struct DaemonSupervisor {
    config: Arc<SupervisorConfig>,
    spec: MatchSpec,
    store: Arc<StateStore>,
    bus: Arc<dyn EventBus>,
    locator: Arc<dyn ProcessLocator>,
    escalator: SignalEscalator,
    launcher: Arc<dyn DaemonLauncher>,
    stats: Arc<dyn StatsSource>,
    guard: OperationGuard,
    poller: Mutex<Option<PollerHandle>>,
    self_ref: Weak<Self>,
}

impl DaemonSupervisor {
    /// Creates a supervisor wired to the real process table, kernel
    /// signals, and the configured daemon binary.
    ///
    /// # Errors
    /// Returns [`SupervisorError::Config`] when the configuration is
    /// invalid.
    pub fn new(config: SupervisorConfig, bus: Arc<dyn EventBus>) -> Result<Arc<Self>> {
        let store = Arc::new(StateStore::new(config.log_capacity, Arc::clone(&bus)));
        let launcher = Arc::new(ProcessLauncher::new(Arc::new(config.clone())));
        Self::with_parts(
            config,
            store,
            bus,
            Arc::new(TableLocator::new()),
            Arc::new(KernelSignals::new()),
            launcher,
            Arc::new(ModeledStats::new()),
        )
    }

    /// Creates a supervisor from explicit collaborators.
    ///
    /// # Errors
    /// Returns [`SupervisorError::Config`] when the configuration is
    /// invalid.
    pub fn with_parts(
        config: SupervisorConfig,
        store: Arc<StateStore>,
        bus: Arc<dyn EventBus>,
        locator: Arc<dyn ProcessLocator>,
        sender: Arc<dyn SignalSender>,
        launcher: Arc<dyn DaemonLauncher>,
        stats: Arc<dyn StatsSource>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let spec = MatchSpec::from_config(&config);
        let escalator = SignalEscalator::new(Arc::clone(&locator), sender, Arc::clone(&store));
        Ok(Arc::new_cyclic(|weak| Self {
            config: Arc::new(config),
            spec,
            store,
            bus,
            locator,
            escalator,
            launcher,
            stats,
            guard: OperationGuard::new(),
            poller: Mutex::new(None),
            self_ref: weak.clone(),
        }))
    }

    /// Current state snapshot.
    #[must_use]
    pub fn status(&self) -> DaemonState {
        self.store.snapshot()
    }

    /// Recent log entries, oldest first.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.store.logs()
    }

    /// Shared state store.
    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Event bus the supervisor publishes on.
    #[must_use]
    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Returns true while a lifecycle operation is in flight.
    #[must_use]
    pub fn operation_in_progress(&self) -> bool {
        self.guard.is_held()
    }

    /// Starts the daemon.
    ///
    /// If a matching process already exists it is adopted instead of
    /// spawning a second one. Otherwise the executable is resolved,
    /// launched with the daemon flag, and presence is confirmed through
    /// the process table before the phase becomes running.
    ///
    /// # Errors
    /// Returns [`SupervisorError::Busy`] when another operation is in
    /// flight, [`SupervisorError::ExecutableNotFound`] when no binary
    /// candidate exists, and [`SupervisorError::LaunchFailed`] when the
    /// spawn fails or the daemon never appears in the table.
    pub async fn start(&self) -> Result<()> {
        let _permit = self.admit("start")?;
        self.start_locked().await
    }

    /// Stops the daemon via signal escalation.
    ///
    /// Stopping an already absent daemon is a successful no-op; no signal
    /// is sent.
    ///
    /// # Errors
    /// Returns [`SupervisorError::Busy`] when another operation is in
    /// flight, [`SupervisorError::QueryFailed`] when the process table is
    /// unreadable, and [`SupervisorError::StopIncomplete`] when the
    /// process survives the full ladder.
    pub async fn stop(&self) -> Result<()> {
        let _permit = self.admit("stop")?;
        self.stop_locked().await
    }

    /// Restarts the daemon: stop, settle, start, under one permit.
    ///
    /// A failed stop aborts the restart; start is not attempted over a
    /// daemon that may still be running.
    ///
    /// # Errors
    /// Returns the stop error when the stop half fails, otherwise any
    /// error from the start half.
    pub async fn restart(&self) -> Result<()> {
        let _permit = self.admit("restart")?;
        self.store.log(LogLevel::Info, "restarting daemon");
        if let Err(e) = self.stop_locked().await {
            self.store
                .log(LogLevel::Error, "restart aborted: stop did not complete");
            return Err(e);
        }
        tokio::time::sleep(self.config.restart_settle).await;
        self.start_locked().await
    }

    /// Reconciles stored state with the observed process table.
    ///
    /// This is advisory. The observation is discarded when a lifecycle
    /// operation is in flight at application time, so a poll can never
    /// clobber the state an operation is mid-way through writing.
    ///
    /// # Errors
    /// Returns [`SupervisorError::QueryFailed`] when the table is
    /// unreadable; stored state is left untouched.
    pub async fn refresh(&self) -> Result<()> {
        let observed = self.locator.locate(&self.spec).await;
        if self.guard.is_held() {
            tracing::debug!("discarding status refresh: lifecycle operation in progress");
            return Ok(());
        }
        match observed {
            Err(e) => {
                self.store
                    .log(LogLevel::Warn, format!("status query failed: {e}"));
                self.bus
                    .publish(DaemonEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                Err(e)
            }
            Ok(Some(desc)) => {
                let previous = self.store.snapshot().phase;
                self.store
                    .update(move |s| {
                        s.phase = DaemonPhase::Running;
                        s.process_id = Some(desc.pid);
                        s.uptime_seconds = desc.uptime_now();
                    })
                    .await;
                if previous == DaemonPhase::Stopped {
                    self.store.log(
                        LogLevel::Info,
                        format!("detected running daemon (pid {})", desc.pid),
                    );
                }
                if previous != DaemonPhase::Running {
                    self.start_poller();
                }
                Ok(())
            }
            Ok(None) => {
                if self.store.snapshot().phase.expects_pid() {
                    self.store
                        .log(LogLevel::Warn, "daemon vanished from the process table");
                    self.store.update(DaemonState::clear).await;
                    self.bus.publish(DaemonEvent::Stopped).await;
                    self.stop_poller();
                }
                Ok(())
            }
        }
    }

    /// Adopts a daemon that was already running when the supervisor came
    /// up. Intended to run once at startup.
    ///
    /// # Errors
    /// Propagates [`DaemonSupervisor::refresh`] errors.
    pub async fn bootstrap(&self) -> Result<()> {
        self.store
            .log(LogLevel::Info, "checking for an existing daemon");
        self.refresh().await
    }

    /// Dispatches lifecycle commands arriving on the event bus.
    ///
    /// Runs until the bus closes or the supervisor is dropped. Operation
    /// errors are already surfaced through the store and bus, so the loop
    /// itself only logs bus-level trouble.
    pub fn spawn_command_loop(&self) -> tokio::task::JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let weak = self.self_ref.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok((_, event)) => {
                        let Some(sup) = weak.upgrade() else { break };
                        match event {
                            DaemonEvent::StartRequested => {
                                let _ = sup.start().await;
                            }
                            DaemonEvent::StopRequested => {
                                let _ = sup.stop().await;
                            }
                            DaemonEvent::RestartRequested => {
                                let _ = sup.restart().await;
                            }
                            _ => {}
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "command loop lagged behind the event bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Stops background polling. The daemon itself is left as-is.
    pub fn shutdown(&self) {
        self.stop_poller();
        self.store.log(LogLevel::Info, "supervisor shut down");
    }

    /// One polling pass: reconcile, then sample stats while running.
    pub(crate) async fn poll_tick(&self) {
        if self.refresh().await.is_err() {
            return;
        }
        let snapshot = self.store.snapshot();
        if snapshot.phase != DaemonPhase::Running {
            return;
        }
        let sample = self.stats.sample(snapshot.uptime_seconds).await;
        if self.guard.is_held() {
            return;
        }
        self.store
            .update(move |s| {
                if s.phase == DaemonPhase::Running {
                    s.apply_sample(sample);
                }
            })
            .await;
    }

    fn admit(&self, op: &'static str) -> Result<OperationPermit<'_>> {
        self.guard.try_acquire(op).inspect_err(|_| {
            self.store.log(
                LogLevel::Warn,
                format!("{op} rejected: another operation is in progress"),
            );
        })
    }

    async fn start_locked(&self) -> Result<()> {
        let executable = match self.launcher.resolve() {
            Ok(path) => path,
            Err(e) => return Err(self.operation_failed("start", e).await),
        };

        match self.locator.locate(&self.spec).await {
            Ok(Some(desc)) => {
                self.store.log(
                    LogLevel::Warn,
                    format!("daemon already running (pid {}), not spawning another", desc.pid),
                );
                self.enter_running(desc).await;
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => return Err(self.operation_failed("start", e).await),
        }

        self.store
            .update(|s| {
                s.phase = DaemonPhase::Starting;
                s.process_id = None;
            })
            .await;
        self.store.log(
            LogLevel::Info,
            format!("starting daemon from {}", executable.display()),
        );

        if let Err(e) = self.launcher.launch(&executable).await {
            self.store.update(DaemonState::clear).await;
            return Err(self.operation_failed("start", e).await);
        }

        for _ in 0..self.config.start_confirm_attempts {
            tokio::time::sleep(self.config.start_confirm_interval).await;
            match self.locator.locate(&self.spec).await {
                Ok(Some(desc)) => {
                    self.store
                        .log(LogLevel::Info, format!("daemon started (pid {})", desc.pid));
                    self.enter_running(desc).await;
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "table query failed while confirming start");
                }
            }
        }

        self.store.update(DaemonState::clear).await;
        let err =
            SupervisorError::launch_failed("daemon did not appear in the process table");
        Err(self.operation_failed("start", err).await)
    }

    async fn stop_locked(&self) -> Result<()> {
        let located = match self.locator.locate(&self.spec).await {
            Ok(found) => found,
            Err(e) => return Err(self.operation_failed("stop", e).await),
        };

        let Some(desc) = located else {
            if self.store.snapshot().phase == DaemonPhase::Stopped {
                self.store.log(LogLevel::Info, "daemon is not running");
            } else {
                self.store.log(LogLevel::Info, "daemon already exited");
                self.store.update(DaemonState::clear).await;
                self.bus.publish(DaemonEvent::Stopped).await;
                self.stop_poller();
            }
            return Ok(());
        };

        self.store
            .update(move |s| {
                s.phase = DaemonPhase::Stopping;
                s.process_id = Some(desc.pid);
            })
            .await;
        self.store
            .log(LogLevel::Info, format!("stopping daemon (pid {})", desc.pid));

        match self
            .escalator
            .escalate(&self.spec, desc.pid, &self.config.escalation)
            .await
        {
            Ok(StopOutcome::Stopped) => {
                self.store.update(DaemonState::clear).await;
                self.store.log(LogLevel::Info, "daemon stopped");
                self.bus.publish(DaemonEvent::Stopped).await;
                self.stop_poller();
                Ok(())
            }
            Ok(StopOutcome::StillAlive(pid)) => {
                self.store
                    .update(move |s| {
                        s.phase = DaemonPhase::Running;
                        s.process_id = Some(pid);
                    })
                    .await;
                // The poller exits when the phase leaves running; the
                // daemon is still up, so bring it back
                self.start_poller();
                Err(self
                    .operation_failed("stop", SupervisorError::StopIncomplete { pid })
                    .await)
            }
            Err(e) => {
                self.store
                    .update(move |s| {
                        s.phase = DaemonPhase::Running;
                        s.process_id = Some(desc.pid);
                    })
                    .await;
                self.start_poller();
                Err(self.operation_failed("stop", e).await)
            }
        }
    }

    /// Records a failed operation: log entry plus error broadcast, then
    /// hands the error back for the caller to return.
    async fn operation_failed(&self, op: &str, error: SupervisorError) -> SupervisorError {
        self.store
            .log(LogLevel::Error, format!("{op} failed: {error}"));
        self.bus
            .publish(DaemonEvent::Error {
                message: error.to_string(),
            })
            .await;
        error
    }

    async fn enter_running(&self, desc: ProcessDescriptor) {
        self.store
            .update(move |s| {
                s.phase = DaemonPhase::Running;
                s.process_id = Some(desc.pid);
                s.uptime_seconds = desc.uptime_now();
            })
            .await;
        self.bus.publish(DaemonEvent::Started { pid: desc.pid }).await;
        self.start_poller();
    }

    fn start_poller(&self) {
        let mut slot = self.poller.lock();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        *slot = Some(StatusPoller::spawn(
            self.self_ref.clone(),
            self.config.poll_interval,
        ));
    }

    fn stop_poller(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.cancel();
        }
    }
}

impl std::fmt::Debug for DaemonSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonSupervisor")
            .field("spec", &self.spec)
            .field("phase", &self.store.snapshot().phase)
            .field("busy", &self.guard.is_held())
            .finish_non_exhaustive()
    }
}
