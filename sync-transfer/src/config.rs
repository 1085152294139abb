//! Server and client settings.
//!
//! These are sections of the root TOML configuration loaded by
//! `sync-coordinator`; every field has a default.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use sync_types::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT};

/// Inbound listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the listener (default: 0.0.0.0:8888).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Maximum connections handled at once (default: 64).
    /// Further connections are closed immediately.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Accepted connections per remote IP per minute (default: 0 = unlimited).
    /// Every operation opens its own connection and rejected connections
    /// are never acknowledged, so a quota must exceed the largest batch the
    /// peer sends in a minute.
    #[serde(default)]
    pub connections_per_minute: u32,
    /// Largest ADD payload accepted, in bytes (default: 64 GiB, 0 = unlimited).
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,
    /// Read chunk size for payloads in bytes (default: 8192).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Directory for staging incoming payloads (default: system temp dir).
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Peer port used when the address has none (default: 8888).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Write chunk size for payloads in bytes (default: 8192).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

// Default value functions
fn default_bind_address() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

fn default_max_connections() -> usize {
    64
}

fn default_max_payload_bytes() -> u64 {
    64 << 30
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_connections: default_max_connections(),
            connections_per_minute: 0,
            max_payload_bytes: default_max_payload_bytes(),
            chunk_size: default_chunk_size(),
            staging_dir: None,
        }
    }
}

impl ServerConfig {
    /// Listener on an ephemeral loopback port, for tests and local tooling.
    pub fn loopback() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            ..Self::default()
        }
    }

    /// Staging directory, falling back to the system temp dir.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Payload cap, `None` when unlimited.
    pub fn max_payload(&self) -> Option<u64> {
        (self.max_payload_bytes > 0).then_some(self.max_payload_bytes)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl ClientConfig {
    /// Connect timeout as a Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}
