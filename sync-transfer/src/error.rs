//! Error types for sync-transfer.

use std::path::PathBuf;

use sync_types::WireError;

use crate::limits::RateLimitError;
use crate::transport::TransportError;

/// Main error type for transfer operations.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Listener could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address we tried to bind.
        address: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Outbound connection could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O failure on an established connection (reset, broken pipe).
    #[error("connection error: {0}")]
    Connection(#[source] std::io::Error),

    /// The peer sent something that is not a valid frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Local file could not be read, written, or removed.
    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Connection turned away by the server's limits.
    #[error("connection rejected: {0}")]
    Rejected(#[from] RateLimitError),
}

/// Protocol layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Header could not be decoded.
    #[error("invalid frame: {0}")]
    Wire(#[from] WireError),

    /// Stream ended inside the header.
    #[error("connection closed before the frame header was complete")]
    TruncatedHeader,

    /// Stream ended before the declared payload length was reached.
    #[error("payload truncated: expected {expected} bytes, received {received}")]
    ShortPayload {
        /// Declared payload length.
        expected: u64,
        /// Bytes actually received.
        received: u64,
    },

    /// Declared payload length is above the server's cap.
    #[error("payload of {declared} bytes exceeds the {max} byte limit")]
    PayloadTooLarge {
        /// Declared payload length.
        declared: u64,
        /// Configured cap.
        max: u64,
    },
}

/// Coarse classification used for reporting and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect timeout, reset, accept or bind failure, rejection.
    Network,
    /// Malformed or truncated frame.
    Protocol,
    /// Local copy, write or delete failure.
    Filesystem,
}

impl TransferError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bind { .. } | Self::Transport(_) | Self::Connection(_) | Self::Rejected(_) => {
                ErrorKind::Network
            }
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
        }
    }

    /// Build a filesystem error for `path`.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<WireError> for TransferError {
    fn from(e: WireError) -> Self {
        Self::Protocol(ProtocolError::Wire(e))
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
