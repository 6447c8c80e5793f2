//! Configuration management for sampler-sync
//!
//! Loads and validates the YAML configuration file. Every section is
//! optional; a missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::connection::TransportMode;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Where and how to reach the plugin
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub transport: TransportMode,
    #[serde(default = "default_path")]
    pub path: String,
}

/// Synchronizer timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(default = "default_volatile_poll_interval_ms")]
    pub volatile_poll_interval_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_resync_debounce_ms")]
    pub resync_debounce_ms: u64,
    /// Request a full state as soon as an update id is skipped
    #[serde(default)]
    pub resync_on_update_gap: bool,
}

/// Log output
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Also write logs to this file, rotated daily
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportMode::default(),
            path: default_path(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            volatile_poll_interval_ms: default_volatile_poll_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            resync_debounce_ms: default_resync_debounce_ms(),
            resync_on_update_gap: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation.
    ///
    /// A missing file is not an error: defaults are used.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::read(path).await?.unwrap_or_default())
    }

    /// Like [`AppConfig::load`], but `None` when the file does not exist
    pub async fn read(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(Some(config))
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.connection.host.trim().is_empty() {
            anyhow::bail!("connection.host cannot be empty");
        }
        if self.connection.port == 0 {
            anyhow::bail!("connection.port must be between 1 and 65535");
        }
        if self.sync.volatile_poll_interval_ms == 0 {
            anyhow::bail!("sync.volatile_poll_interval_ms must be greater than 0");
        }
        if self.sync.resync_debounce_ms == 0 {
            anyhow::bail!("sync.resync_debounce_ms must be greater than 0");
        }
        if let Some(file) = &self.logging.file {
            if file.trim().is_empty() {
                anyhow::bail!("logging.file cannot be empty when set");
            }
        }
        Ok(())
    }
}

fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 8125 }
fn default_path() -> String { "/source_coms/".to_string() }
fn default_volatile_poll_interval_ms() -> u64 { 100 }
fn default_reconnect_delay_ms() -> u64 { 2000 }
fn default_resync_debounce_ms() -> u64 { 1000 }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.yaml")).await.unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.connection.port, 8125);
        assert_eq!(config.connection.path, "/source_coms/");
        assert_eq!(config.sync.reconnect_delay_ms, 2000);
    }

    #[tokio::test]
    async fn test_read_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::read(dir.path().join("absent.yaml")).await.unwrap().is_none());

        let file = write_config("connection:\n  port: 9000\n");
        let config = AppConfig::read(file.path()).await.unwrap().unwrap();
        assert_eq!(config.connection.port, 9000);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let file = write_config(
            "connection:\n  host: studio.local\n  transport: auto\nsync:\n  resync_on_update_gap: true\n",
        );
        let config = AppConfig::load(file.path()).await.unwrap();

        assert_eq!(config.connection.host, "studio.local");
        assert_eq!(config.connection.port, 8125);
        assert_eq!(config.connection.transport, TransportMode::Auto);
        assert!(config.sync.resync_on_update_gap);
        assert_eq!(config.sync.volatile_poll_interval_ms, 100);
        assert!(config.logging.file.is_none());
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let file = write_config("sync:\n  volatile_poll_interval_ms: 0\n");
        let err = AppConfig::load(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("volatile_poll_interval_ms"));

        let file = write_config("connection:\n  transport: carrier-pigeon\n");
        assert!(AppConfig::load(file.path()).await.is_err());
    }

    #[test]
    fn test_validate_host() {
        let mut config = AppConfig::default();
        config.connection.host = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
