//! Operations received from the peer.

use async_trait::async_trait;
use sync_types::Opcode;
use tempfile::TempPath;

use crate::error::TransferError;

/// One unit of work received on the wire.
///
/// Consumed exactly once by an [`OperationSink`]. The staged payload of an
/// `Add` is deleted when the operation is dropped.
#[derive(Debug)]
pub enum Operation {
    /// Create or overwrite `name` with the staged payload.
    Add {
        /// Target file name.
        name: String,
        /// Fully received payload.
        content: TempPath,
        /// Payload length in bytes.
        length: u64,
    },
    /// Remove `name` if it exists.
    Delete {
        /// Target file name.
        name: String,
    },
}

impl Operation {
    /// Target file name.
    pub fn name(&self) -> &str {
        match self {
            Self::Add { name, .. } | Self::Delete { name } => name,
        }
    }

    /// Wire opcode this operation came from.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Add { .. } => Opcode::Add,
            Self::Delete { .. } => Opcode::Delete,
        }
    }
}

/// Receiver of operations parsed by the server.
///
/// The server awaits `apply` before reporting success for a connection, so
/// an `Ok` here means the operation is visible in the folder.
#[async_trait]
pub trait OperationSink: Send + Sync {
    /// Apply one operation.
    async fn apply(&self, operation: Operation) -> Result<(), TransferError>;
}
