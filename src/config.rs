//! Configuration file support
//!
//! Settings come from `seclog.toml` (or the file given with `--config`);
//! command-line flags override them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use seclog_eventlog::DEFAULT_BATCH_SIZE;
use seclog_logs::{Channel, DEFAULT_POLL_INTERVAL};

/// Config file looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "seclog.toml";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SeclogConfig {
    /// Records requested per native read
    pub batch_size: usize,

    /// Seconds between monitor iterations
    pub poll_interval_secs: u64,

    /// Channels fetched when none are given on the command line
    pub channels: Vec<String>,

    /// Read channels from this snapshot directory instead of the live log
    pub snapshot_dir: Option<PathBuf>,

    /// Default tracing directive when RUST_LOG is unset
    pub log_level: Option<String>,
}

impl Default for SeclogConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            channels: Channel::ALL.iter().map(|c| c.to_string()).collect(),
            snapshot_dir: None,
            log_level: None,
        }
    }
}

impl SeclogConfig {
    /// Load from an explicit path, or from `seclog.toml` if one exists.
    ///
    /// An explicit path must exist; a missing default file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SeclogConfig::default();
        assert_eq!(config.batch_size, 1024);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.channels, ["Security", "System", "Application"]);
        assert_eq!(SeclogConfig::from_toml("").unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = SeclogConfig::from_toml(
            r#"
            poll_interval_secs = 30
            channels = ["System"]
            snapshot_dir = "/var/tmp/logs"
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.channels, ["System"]);
        assert_eq!(config.snapshot_dir, Some(PathBuf::from("/var/tmp/logs")));
        assert_eq!(config.batch_size, 1024);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(SeclogConfig::from_toml("batch_size = 0").is_err());
        assert!(SeclogConfig::from_toml("poll_interval = 3").is_err());
        assert!(SeclogConfig::from_toml("channels = \"System\"").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "log_level = \"debug\"\n").unwrap();

        let config = SeclogConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        assert!(SeclogConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
