//! Mock collaborators for supervisor testing.
//!
//! The real supervisor talks to the OS through four seams: the process
//! table, signal delivery, process launch, and stat sampling. These mocks
//! share one [`FakeTable`] so a launch makes a process appear, a fatal
//! signal makes it disappear, and the locator observes both, mirroring how
//! the real collaborators couple through the kernel.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, SupervisorError};
use crate::escalate::SignalSender;
use crate::launch::DaemonLauncher;
use crate::locate::{MatchSpec, ProcessLocator};
use crate::types::{ProcessDescriptor, StopSignal, unix_now};

/// In-memory stand-in for the OS process table, holding at most the one
/// supervised daemon.
pub struct FakeTable {
    entry: parking_lot::Mutex<Option<ProcessDescriptor>>,
    /// Signals that remove the entry when delivered.
    fatal_signals: parking_lot::RwLock<Vec<StopSignal>>,
    /// Whether table queries should fail.
    fail_queries: AtomicBool,
    /// Number of locate and confirm calls.
    query_count: AtomicU32,
}

impl FakeTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entry: parking_lot::Mutex::new(None),
            fatal_signals: parking_lot::RwLock::new(Vec::new()),
            fail_queries: AtomicBool::new(false),
            query_count: AtomicU32::new(0),
        })
    }

    /// Inserts a daemon that started just now.
    pub fn insert(&self, pid: u32) {
        *self.entry.lock() = Some(ProcessDescriptor::new(pid, unix_now()));
    }

    /// Inserts a daemon that has been up for `age_seconds`.
    pub fn insert_aged(&self, pid: u32, age_seconds: u64) {
        let start = unix_now().saturating_sub(age_seconds);
        *self.entry.lock() = Some(ProcessDescriptor::new(pid, start));
    }

    /// Removes the daemon, as if it exited.
    pub fn remove(&self) {
        *self.entry.lock() = None;
    }

    /// Current entry, if any.
    #[must_use]
    pub fn current(&self) -> Option<ProcessDescriptor> {
        *self.entry.lock()
    }

    /// Declares `signal` fatal: delivering it removes the entry.
    pub fn dies_on(&self, signal: StopSignal) {
        self.fatal_signals.write().push(signal);
    }

    /// Makes every query fail until reset.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Number of locate and confirm calls so far.
    #[must_use]
    pub fn query_count(&self) -> u32 {
        self.query_count.load(Ordering::SeqCst)
    }

    fn query(&self) -> Result<Option<ProcessDescriptor>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(SupervisorError::query_failed("scripted table failure"));
        }
        Ok(self.current())
    }

    fn deliver(&self, signal: StopSignal) {
        if self.fatal_signals.read().contains(&signal) {
            self.remove();
        }
    }
}

/// Locator backed by a [`FakeTable`].
pub struct ScriptedLocator {
    table: Arc<FakeTable>,
}

impl ScriptedLocator {
    /// Creates a locator over `table`.
    #[must_use]
    pub fn new(table: Arc<FakeTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl ProcessLocator for ScriptedLocator {
    async fn locate(&self, _spec: &MatchSpec) -> Result<Option<ProcessDescriptor>> {
        self.table.query()
    }

    async fn confirm(&self, _spec: &MatchSpec, pid: u32) -> Result<bool> {
        Ok(self.table.query()?.map(|d| d.pid) == Some(pid))
    }
}

/// Sender that records deliveries and applies fatal signals to the table.
pub struct RecordingSender {
    table: Arc<FakeTable>,
    sent: parking_lot::Mutex<Vec<(u32, StopSignal)>>,
}

impl RecordingSender {
    /// Creates a sender coupled to `table`.
    #[must_use]
    pub fn new(table: Arc<FakeTable>) -> Self {
        Self {
            table,
            sent: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Every delivery so far as (pid, signal) pairs.
    #[must_use]
    pub fn sent(&self) -> Vec<(u32, StopSignal)> {
        self.sent.lock().clone()
    }

    /// Just the signal sequence.
    #[must_use]
    pub fn signals(&self) -> Vec<StopSignal> {
        self.sent.lock().iter().map(|(_, s)| *s).collect()
    }
}

impl SignalSender for RecordingSender {
    fn send(&self, pid: u32, signal: StopSignal) -> Result<()> {
        self.sent.lock().push((pid, signal));
        self.table.deliver(signal);
        Ok(())
    }
}

/// Launcher that registers a fresh pid in the table instead of spawning.
pub struct MockLauncher {
    table: Arc<FakeTable>,
    executable: parking_lot::RwLock<Option<PathBuf>>,
    fail_spawn: AtomicBool,
    launch_delay: parking_lot::RwLock<Duration>,
    next_pid: AtomicU32,
    launches: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl MockLauncher {
    /// Creates a launcher that resolves and spawns successfully.
    #[must_use]
    pub fn new(table: Arc<FakeTable>) -> Self {
        Self {
            table,
            executable: parking_lot::RwLock::new(Some(PathBuf::from("/usr/local/bin/i2pd"))),
            fail_spawn: AtomicBool::new(false),
            launch_delay: parking_lot::RwLock::new(Duration::ZERO),
            next_pid: AtomicU32::new(4000),
            launches: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        }
    }

    /// Configures resolution to fail as if no binary exists.
    #[must_use]
    pub fn with_missing_executable(self) -> Self {
        *self.executable.write() = None;
        self
    }

    /// Configures spawn to fail after resolution succeeds.
    #[must_use]
    pub fn fail_spawn(self) -> Self {
        self.fail_spawn.store(true, Ordering::SeqCst);
        self
    }

    /// Makes each launch take `delay`, to hold operations open.
    #[must_use]
    pub fn with_launch_delay(self, delay: Duration) -> Self {
        *self.launch_delay.write() = delay;
        self
    }

    /// Number of successful spawns.
    #[must_use]
    pub fn launch_count(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Highest number of launches observed in flight at once.
    #[must_use]
    pub fn max_concurrent_launches(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DaemonLauncher for MockLauncher {
    fn resolve(&self) -> Result<PathBuf> {
        self.executable.read().clone().ok_or_else(|| {
            SupervisorError::ExecutableNotFound {
                searched: vec![
                    PathBuf::from("./i2pd"),
                    PathBuf::from("/usr/local/bin/i2pd"),
                ],
            }
        })
    }

    async fn launch(&self, _executable: &std::path::Path) -> Result<u32> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        let delay = *self.launch_delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_spawn.load(Ordering::SeqCst) {
            Err(SupervisorError::launch_failed("scripted spawn failure"))
        } else {
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            self.table.insert(pid);
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(pid)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_table_couples_launch_and_locate() {
        let table = FakeTable::new();
        let launcher = MockLauncher::new(Arc::clone(&table));
        let locator = ScriptedLocator::new(Arc::clone(&table));
        let spec = MatchSpec::new("i2pd", "--daemon");

        assert_eq!(locator.locate(&spec).await.unwrap(), None);
        let pid = launcher.launch(std::path::Path::new("/x")).await.unwrap();
        assert_eq!(locator.locate(&spec).await.unwrap().map(|d| d.pid), Some(pid));
    }

    #[tokio::test]
    async fn test_fatal_signal_removes_entry() {
        let table = FakeTable::new();
        table.insert(31);
        table.dies_on(StopSignal::Terminate);
        let sender = RecordingSender::new(Arc::clone(&table));

        sender.send(31, StopSignal::Interrupt).unwrap();
        assert!(table.current().is_some());
        sender.send(31, StopSignal::Terminate).unwrap();
        assert!(table.current().is_none());
        assert_eq!(
            sender.signals(),
            vec![StopSignal::Interrupt, StopSignal::Terminate]
        );
    }

    #[tokio::test]
    async fn test_scripted_query_failure() {
        let table = FakeTable::new();
        table.insert(7);
        table.fail_queries(true);
        let locator = ScriptedLocator::new(Arc::clone(&table));
        let spec = MatchSpec::new("i2pd", "--daemon");

        assert!(locator.locate(&spec).await.is_err());
        table.fail_queries(false);
        assert!(locator.locate(&spec).await.unwrap().is_some());
    }
}
