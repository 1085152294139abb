//! Transfer status values published to observers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one transfer (one frame sent or received).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Create a new random TransferId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferId({})", &self.0.simple().to_string()[..8])
    }
}

/// Most recent state of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransferStatus {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// Outgoing payload in progress.
    Sending {
        /// File being sent.
        name: String,
        /// Percentage of the payload written, 0-100.
        progress: u8,
    },
    /// Incoming payload in progress.
    Receiving {
        /// File being received.
        name: String,
        /// Percentage of the payload read, 0-100.
        progress: u8,
    },
    /// The last transfer completed.
    Success,
    /// The last transfer failed.
    Error {
        /// Human-readable cause.
        message: String,
    },
}

impl TransferStatus {
    /// Whether this status ends a transfer.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error { .. })
    }

    /// Progress percentage, if this is an in-flight status.
    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::Sending { progress, .. } | Self::Receiving { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Sending { name, progress } => write!(f, "sending {name} ({progress}%)"),
            Self::Receiving { name, progress } => write!(f, "receiving {name} ({progress}%)"),
            Self::Success => write!(f, "success"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// A status update tagged with the transfer it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Which transfer this update is for.
    pub id: TransferId,
    /// The new status.
    pub status: TransferStatus,
}

/// `floor(done / total * 100)`, with an empty payload counting as complete.
pub fn progress_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total);
    ((u128::from(done) * 100) / u128::from(total)) as u8
}
