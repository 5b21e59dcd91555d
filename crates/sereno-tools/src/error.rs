//! Error types for tool execution.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors produced while resolving or running a companion tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No executable found for the tool at any searched location.
    #[error("tool {tool} not found ({} locations searched)", searched.len())]
    NotFound {
        /// Tool executable name.
        tool: String,
        /// Every path that was checked, in order.
        searched: Vec<PathBuf>,
    },

    /// The tool process could not be spawned.
    #[error("failed to launch tool: {0}")]
    LaunchFailed(String),

    /// The tool ran past its time limit and was terminated.
    #[error("tool {tool} timed out after {}", humantime::format_duration(*limit))]
    Timeout {
        /// Tool executable name.
        tool: String,
        /// The limit that was exceeded.
        limit: Duration,
    },

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Creates a launch failure.
    #[must_use]
    pub fn launch_failed(msg: impl Into<String>) -> Self {
        Self::LaunchFailed(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true for the timeout variant.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
