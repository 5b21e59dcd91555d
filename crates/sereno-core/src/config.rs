//! Supervisor configuration.
//!
//! Validated at load time, with defaults matching the daemon this shell was
//! built around (i2pd). Everything here is overridable from a TOML file so
//! the supervisor itself stays binary-agnostic.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SupervisorError};
use crate::types::{StopSignal, StopStep};

/// Configuration for the daemon supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Name of the daemon binary.
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Flag that puts the binary into detached daemon mode.
    #[serde(default = "default_daemon_flag")]
    pub daemon_flag: String,

    /// Directory holding the bundled copy of the binary, checked before the
    /// fallback paths. Typically the application's resource directory.
    #[serde(default)]
    pub resource_dir: Option<PathBuf>,

    /// Ordered filesystem fallbacks for the binary; first existing wins.
    #[serde(default = "default_fallback_paths")]
    pub fallback_paths: Vec<PathBuf>,

    /// Status poll interval while the daemon is running.
    #[serde(default = "default_poll_interval")]
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Stop escalation sequence, applied in order.
    #[serde(default = "default_escalation")]
    pub escalation: Vec<StopStep>,

    /// Delay between the stop and start halves of a restart.
    #[serde(default = "default_restart_settle")]
    #[serde(with = "humantime_serde")]
    pub restart_settle: Duration,

    /// How many times to re-check the table for a freshly launched daemon.
    #[serde(default = "default_start_confirm_attempts")]
    pub start_confirm_attempts: u32,

    /// Delay between those re-checks.
    #[serde(default = "default_start_confirm_interval")]
    #[serde(with = "humantime_serde")]
    pub start_confirm_interval: Duration,

    /// Maximum retained log entries; oldest are dropped on overflow.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_binary_name() -> String {
    "i2pd".to_string()
}

fn default_daemon_flag() -> String {
    "--daemon".to_string()
}

fn default_fallback_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("./i2pd"),
        PathBuf::from("/usr/local/bin/i2pd"),
        PathBuf::from("/opt/homebrew/bin/i2pd"),
        PathBuf::from("/usr/bin/i2pd"),
    ]
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_escalation() -> Vec<StopStep> {
    vec![
        StopStep::new(StopSignal::Interrupt, Duration::from_secs(2)),
        StopStep::new(StopSignal::Terminate, Duration::from_secs(1)),
        StopStep::new(StopSignal::Kill, Duration::from_secs(1)),
    ]
}

fn default_restart_settle() -> Duration {
    Duration::from_secs(2)
}

fn default_start_confirm_attempts() -> u32 {
    10
}

fn default_start_confirm_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_log_capacity() -> usize {
    100
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            binary_name: default_binary_name(),
            daemon_flag: default_daemon_flag(),
            resource_dir: None,
            fallback_paths: default_fallback_paths(),
            poll_interval: default_poll_interval(),
            escalation: default_escalation(),
            restart_settle: default_restart_settle(),
            start_confirm_attempts: default_start_confirm_attempts(),
            start_confirm_interval: default_start_confirm_interval(),
            log_capacity: default_log_capacity(),
        }
    }
}

impl SupervisorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every location the daemon binary may live at, in search order.
    #[must_use]
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(self.fallback_paths.len() + 1);
        if let Some(dir) = &self.resource_dir {
            paths.push(dir.join(&self.binary_name));
        }
        paths.extend(self.fallback_paths.iter().cloned());
        paths
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.binary_name.is_empty() {
            return Err(SupervisorError::config("binary_name cannot be empty"));
        }
        if !self
            .binary_name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(SupervisorError::config(
                "binary_name must contain only alphanumeric characters, hyphens, underscores, and dots",
            ));
        }
        if self.daemon_flag.is_empty() {
            return Err(SupervisorError::config("daemon_flag cannot be empty"));
        }
        if self.resource_dir.is_none() && self.fallback_paths.is_empty() {
            return Err(SupervisorError::config(
                "at least one search location is required (resource_dir or fallback_paths)",
            ));
        }
        if self.escalation.is_empty() {
            return Err(SupervisorError::config(
                "escalation must contain at least one step",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(SupervisorError::config("poll_interval must be positive"));
        }
        if self.start_confirm_attempts == 0 {
            return Err(SupervisorError::config(
                "start_confirm_attempts must be greater than 0",
            ));
        }
        if self.log_capacity == 0 {
            return Err(SupervisorError::config(
                "log_capacity must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or the
    /// contents fail validation.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SupervisorError::config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SupervisorError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = SupervisorConfig::new();
        assert_eq!(config.binary_name, "i2pd");
        assert_eq!(config.daemon_flag, "--daemon");
        assert!(config.resource_dir.is_none());
        assert_eq!(config.fallback_paths.len(), 4);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.restart_settle, Duration::from_secs(2));
        assert_eq!(config.log_capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_escalation_order() {
        let config = SupervisorConfig::default();
        let signals: Vec<StopSignal> = config.escalation.iter().map(|s| s.signal).collect();
        assert_eq!(
            signals,
            vec![StopSignal::Interrupt, StopSignal::Terminate, StopSignal::Kill]
        );
        assert_eq!(config.escalation[0].wait_after, Duration::from_secs(2));
        assert_eq!(config.escalation[1].wait_after, Duration::from_secs(1));
        assert_eq!(config.escalation[2].wait_after, Duration::from_secs(1));
    }

    #[test]
    fn test_search_paths_resource_dir_first() {
        let config = SupervisorConfig {
            resource_dir: Some(PathBuf::from("/app/resources")),
            ..Default::default()
        };
        let paths = config.search_paths();
        assert_eq!(paths[0], PathBuf::from("/app/resources/i2pd"));
        assert_eq!(paths.len(), 5);
    }

    #[test]
    fn test_validate_empty_binary_name() {
        let config = SupervisorConfig {
            binary_name: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_binary_name_charset() {
        let config = SupervisorConfig {
            binary_name: "i2pd 2".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SupervisorConfig {
            binary_name: "i2pd-2.45".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_no_search_locations() {
        let config = SupervisorConfig {
            resource_dir: None,
            fallback_paths: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_escalation() {
        let config = SupervisorConfig {
            escalation: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let config = SupervisorConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_confirm_attempts() {
        let config = SupervisorConfig {
            start_confirm_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_log_capacity() {
        let config = SupervisorConfig {
            log_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
binary_name = "i2pd"
poll_interval = "10s"
restart_settle = "500ms"

[[escalation]]
signal = "terminate"
wait_after = "3s"

[[escalation]]
signal = "kill"
wait_after = "1s"
"#
        )
        .unwrap();

        let config = SupervisorConfig::load(file.path()).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.restart_settle, Duration::from_millis(500));
        assert_eq!(config.escalation.len(), 2);
        assert_eq!(config.escalation[0].signal, StopSignal::Terminate);
        // Unspecified fields keep their defaults
        assert_eq!(config.log_capacity, 100);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "binary_name = \"\"").unwrap();
        assert!(SupervisorConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = SupervisorConfig::load("/nonexistent/sereno.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_config_serialize_roundtrip() {
        let config = SupervisorConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let back: SupervisorConfig = toml::from_str(&toml).unwrap();
        assert_eq!(back.binary_name, config.binary_name);
        assert_eq!(back.escalation, config.escalation);
        assert_eq!(back.poll_interval, config.poll_interval);
    }
}
