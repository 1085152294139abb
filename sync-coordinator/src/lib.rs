//! # sync-coordinator
//!
//! Session lifecycle for PeerSync.
//!
//! The link layer (Wi-Fi Direct, a VPN, a test harness) tells the
//! [`SyncCoordinator`] when a peer comes and goes. While a session is
//! active the coordinator:
//! - keeps a synchronized folder that starts out empty
//! - runs a [`TransferServer`](sync_transfer::TransferServer) that applies
//!   the peer's ADD/DELETE operations to that folder
//! - pushes local files to the peer with bounded retry
//! - publishes the folder listing after every change
//!
//! When the session ends the listener stops and the folder is deleted.
//!
//! ## Example
//!
//! ```ignore
//! use sync_coordinator::{Config, SyncCoordinator};
//!
//! let coordinator = SyncCoordinator::new(Config::default(), "/data/synced_files");
//! coordinator.on_connection_established("192.168.49.1").await?;
//! coordinator.sync_file(Path::new("notes/todo.txt"), "192.168.49.1").await?;
//! coordinator.on_connection_terminated().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod listing;
pub mod retry;
pub mod session;

pub use config::{Config, ConfigError, SyncConfig, SYNC_FOLDER_NAME};
pub use coordinator::{SyncCoordinator, SyncOutcome, SyncReport};
pub use error::{CoordinatorError, Result};
pub use session::SyncSession;
