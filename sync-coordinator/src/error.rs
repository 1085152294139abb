//! Error types for sync-coordinator.

use std::path::PathBuf;
use sync_transfer::{ErrorKind, TransferError};

use crate::config::ConfigError;

/// Errors from coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Sending to the peer failed; after retries this is the last attempt's error.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Synchronized folder or source file could not be read or written.
    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        /// File or folder involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Candidate path has no usable file name.
    #[error("not a syncable file: {}", path.display())]
    InvalidFile {
        /// Offending path.
        path: PathBuf,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CoordinatorError {
    /// Build a filesystem error for `path`.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Classify this error in the transfer taxonomy.
    ///
    /// Configuration errors have no transfer counterpart and return `None`.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Transfer(e) => Some(e.kind()),
            Self::Filesystem { .. } | Self::InvalidFile { .. } => Some(ErrorKind::Filesystem),
            Self::Config(_) => None,
        }
    }
}

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
