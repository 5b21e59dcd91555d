//! Daemon executable resolution and launch.
//!
//! The executable is looked up at a configured resource location first and
//! then through an ordered list of fallback paths. Launch passes the daemon
//! flag, detaches stdio, and lets the child background itself; the spawned
//! pid is only a hint, and the supervisor confirms real presence through
//! the process table afterwards.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};

/// Picks the first existing candidate from the configured search paths.
///
/// # Errors
/// Returns [`SupervisorError::ExecutableNotFound`] carrying every searched
/// path when no candidate exists.
pub fn resolve_executable(config: &SupervisorConfig) -> Result<PathBuf> {
    let searched = config.search_paths();
    searched
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(SupervisorError::ExecutableNotFound { searched })
}

/// Starts the daemon process.
#[async_trait]
pub trait DaemonLauncher: Send + Sync {
    /// Resolves the executable to launch.
    ///
    /// # Errors
    /// Returns [`SupervisorError::ExecutableNotFound`] when no candidate
    /// path exists.
    fn resolve(&self) -> Result<PathBuf>;

    /// Spawns `executable` in daemon mode and returns the spawned pid.
    ///
    /// # Errors
    /// Returns [`SupervisorError::LaunchFailed`] when the process cannot
    /// be spawned.
    async fn launch(&self, executable: &Path) -> Result<u32>;
}

/// Launches the real daemon binary with the configured flag.
pub struct ProcessLauncher {
    config: Arc<SupervisorConfig>,
}

impl ProcessLauncher {
    /// Creates a launcher for the given configuration.
    #[must_use]
    pub fn new(config: Arc<SupervisorConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DaemonLauncher for ProcessLauncher {
    fn resolve(&self) -> Result<PathBuf> {
        resolve_executable(&self.config)
    }

    async fn launch(&self, executable: &Path) -> Result<u32> {
        let mut child = tokio::process::Command::new(executable)
            .arg(&self.config.daemon_flag)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SupervisorError::launch_failed(format!(
                    "failed to spawn {}: {e}",
                    executable.display()
                ))
            })?;

        let pid = child.id().ok_or_else(|| {
            SupervisorError::launch_failed("spawned process exited before pid was read")
        })?;
        tracing::info!(pid, executable = %executable.display(), "spawned daemon process");

        // The daemon re-forks into the background, so this child is expected
        // to exit quickly. Reap it off to the side; the process table is the
        // source of truth for the real daemon.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(pid)
    }
}
