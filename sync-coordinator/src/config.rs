//! Configuration loading for PeerSync.
//!
//! Configuration is loaded from a TOML file (default: `peersync.toml` in
//! the platform config dir). Every section and field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_core::{retry, RetryPolicy};
use sync_transfer::{ClientConfig, ServerConfig};

/// Name of the synchronized folder inside the data directory.
pub const SYNC_FOLDER_NAME: &str = "synced_files";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Inbound listener.
    #[serde(default)]
    pub server: ServerConfig,
    /// Outbound sends.
    #[serde(default)]
    pub client: ClientConfig,
    /// Synchronized folder and retry behaviour.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Synchronized folder configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Synchronized folder (default: `<data dir>/synced_files`).
    #[serde(default)]
    pub folder: Option<PathBuf>,
    /// Attempts per outgoing operation (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff unit in seconds; the delay after attempt n is n * backoff_secs (default: 1).
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Skip files whose copy in the folder is at least as new (default: false).
    #[serde(default)]
    pub skip_unchanged: bool,
}

// Default value functions
fn default_max_attempts() -> u32 {
    retry::DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_secs() -> u64 {
    retry::DEFAULT_BACKOFF.as_secs()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            folder: None,
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            skip_unchanged: false,
        }
    }
}

impl SyncConfig {
    /// Retry policy for outgoing operations.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.backoff_secs))
    }

    /// Configured folder, or `synced_files` under `data_dir`.
    pub fn folder_or(&self, data_dir: &Path) -> PathBuf {
        self.folder
            .clone()
            .unwrap_or_else(|| data_dir.join(SYNC_FOLDER_NAME))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {}: {source}", path.display())]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {}: {source}", path.display())]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:8888");
        assert_eq!(config.client.port, 8888);
        assert_eq!(config.client.connect_timeout_secs, 5);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.backoff_secs, 1);
        assert!(!config.sync.skip_unchanged);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
bind_address = "127.0.0.1:9999"
max_connections = 8

[client]
port = 9999

[sync]
folder = "/data/shared"
max_attempts = 5
skip_unchanged = true
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9999");
        assert_eq!(config.server.max_connections, 8);
        assert_eq!(config.client.port, 9999);
        assert_eq!(config.sync.folder, Some(PathBuf::from("/data/shared")));
        assert_eq!(config.sync.max_attempts, 5);
        assert_eq!(config.sync.backoff_secs, 1);
        assert!(config.sync.skip_unchanged);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.chunk_size, 8192);
        assert_eq!(config.sync.folder, None);
    }

    #[test]
    fn folder_defaults_under_data_dir() {
        let sync = SyncConfig::default();
        assert_eq!(
            sync.folder_or(Path::new("/var/lib/peersync")),
            PathBuf::from("/var/lib/peersync/synced_files")
        );
    }

    #[test]
    fn retry_policy_from_config() {
        let sync = SyncConfig {
            max_attempts: 4,
            backoff_secs: 2,
            ..SyncConfig::default()
        };
        let policy = sync.retry_policy();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.total_backoff(), Duration::from_secs(12));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::from_file(Path::new("/nonexistent/peersync.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peersync.toml");
        std::fs::write(&path, "[sync]\nmax_attempts = \"three\"\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("peersync.toml"));
    }
}
