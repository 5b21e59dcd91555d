//! Tool runner configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::ToolKind;
use crate::error::{Result, ToolError};

fn default_fallback_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("."),
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/opt/homebrew/bin"),
        PathBuf::from("/usr/bin"),
    ]
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_cancel_grace() -> Duration {
    Duration::from_secs(2)
}

/// Where tools live and how long they may run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Bundled resource directory searched before the fallbacks.
    #[serde(default)]
    pub resource_dir: Option<PathBuf>,

    /// Directories searched for tool executables, in order.
    #[serde(default = "default_fallback_dirs")]
    pub fallback_dirs: Vec<PathBuf>,

    /// Wall-clock limit for a tool run.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Grace period between terminate and force-kill when ending a run.
    #[serde(default = "default_cancel_grace", with = "humantime_serde")]
    pub cancel_grace: Duration,

    /// Working directory for tool runs; the user's home when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            resource_dir: None,
            fallback_dirs: default_fallback_dirs(),
            timeout: default_timeout(),
            cancel_grace: default_cancel_grace(),
            working_dir: None,
        }
    }
}

impl ToolsConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories searched for executables, resource directory first.
    #[must_use]
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(self.fallback_dirs.len() + 1);
        if let Some(resource) = &self.resource_dir {
            dirs.push(resource.clone());
        }
        dirs.extend(self.fallback_dirs.iter().cloned());
        dirs
    }

    /// Resolves the executable path for `tool`.
    ///
    /// # Errors
    /// Returns [`ToolError::NotFound`] carrying every searched path when no
    /// candidate exists.
    pub fn resolve(&self, tool: ToolKind) -> Result<PathBuf> {
        let searched: Vec<PathBuf> = self
            .search_dirs()
            .iter()
            .map(|dir| dir.join(tool.executable_name()))
            .collect();
        searched
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| ToolError::NotFound {
                tool: tool.executable_name().to_string(),
                searched,
            })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`ToolError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.resource_dir.is_none() && self.fallback_dirs.is_empty() {
            return Err(ToolError::config("no tool search locations configured"));
        }
        if self.timeout.is_zero() {
            return Err(ToolError::config("timeout must be non-zero"));
        }
        Ok(())
    }

    /// Loads and validates a configuration from a TOML file.
    ///
    /// # Errors
    /// Returns [`ToolError::Config`] when the file cannot be read, parsed,
    /// or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ToolError::config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ToolError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Candidate daemon data directories, most specific first.
#[must_use]
pub fn data_dir_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("/var/lib/i2pd")];
    if let Some(home) = dirs_next::home_dir() {
        candidates.push(home.join(".i2pd"));
        candidates.push(home.join("Library/Application Support/i2pd"));
    }
    candidates
}

/// First existing daemon data directory, falling back to the user's home.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    data_dir_candidates()
        .into_iter()
        .find(|p| p.is_dir())
        .or_else(dirs_next::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Serde helper for humantime durations.
pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as a human-readable string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    /// Deserializes a duration from a human-readable string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
