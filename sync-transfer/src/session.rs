//! Per-connection handling.
//!
//! Each accepted connection carries exactly one frame. The session reads
//! the header, stages an ADD payload in a `receiving_*` temp file, hands the
//! resulting [`Operation`] to the sink and closes. A payload that ends early
//! is never handed over; its temp file is removed when the session drops it.

use std::net::SocketAddr;
use std::sync::Arc;
use sync_core::ProgressTracker;
use sync_types::{FrameHeader, TransferId, TransferStatus};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::codec::read_header;
use crate::config::ServerConfig;
use crate::error::{ProtocolError, Result, TransferError};
use crate::operation::{Operation, OperationSink};
use crate::status::StatusPublisher;

/// Prefix for staged payload files.
pub const STAGING_PREFIX: &str = "receiving_";

/// State shared by every session of one server.
pub(crate) struct ServerContext {
    pub(crate) config: ServerConfig,
    pub(crate) sink: Arc<dyn OperationSink>,
    pub(crate) status: StatusPublisher,
}

/// A single inbound connection.
pub struct Session<S> {
    context: Arc<ServerContext>,
    stream: S,
    peer: SocketAddr,
    id: TransferId,
}

impl<S> Session<S>
where
    S: AsyncRead + Unpin + Send,
{
    pub(crate) fn new(context: Arc<ServerContext>, stream: S, peer: SocketAddr) -> Self {
        Self {
            context,
            stream,
            peer,
            id: TransferId::new(),
        }
    }

    /// Transfer id used for this connection's status events.
    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Handle the connection to completion.
    ///
    /// Publishes `Success` once the sink has applied the operation, or
    /// `Error` with the failure message.
    pub async fn run(mut self) -> Result<()> {
        tracing::debug!("New connection from {}", self.peer);
        let result = self.handle().await;

        match &result {
            Ok(()) => self.context.status.publish(self.id, TransferStatus::Success),
            Err(e) => {
                tracing::warn!("Connection from {} failed: {}", self.peer, e);
                self.context.status.publish(
                    self.id,
                    TransferStatus::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
        result
    }

    async fn handle(&mut self) -> Result<()> {
        let header = read_header(&mut self.stream).await?;
        let operation = match header {
            FrameHeader::Add { name, length } => self.receive_payload(name, length).await?,
            FrameHeader::Delete { name } => Operation::Delete { name },
        };

        tracing::info!(
            "Received {} {} from {}",
            operation.opcode(),
            operation.name(),
            self.peer
        );
        self.context.sink.apply(operation).await
    }

    async fn receive_payload(&mut self, name: String, length: u64) -> Result<Operation> {
        if let Some(max) = self.context.config.max_payload() {
            if length > max {
                return Err(ProtocolError::PayloadTooLarge {
                    declared: length,
                    max,
                }
                .into());
            }
        }

        let staging = self.context.config.staging_dir();
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&staging)
            .map_err(|e| TransferError::filesystem(&staging, e))?;
        let (file, path) = staged.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut tracker = ProgressTracker::new(length);
        let mut buf = vec![0u8; self.context.config.chunk_size()];
        while !tracker.is_complete() {
            let want = buf
                .len()
                .min(usize::try_from(tracker.remaining()).unwrap_or(usize::MAX));
            let n = self
                .stream
                .read(&mut buf[..want])
                .await
                .map_err(TransferError::Connection)?;
            if n == 0 {
                return Err(ProtocolError::ShortPayload {
                    expected: length,
                    received: tracker.done(),
                }
                .into());
            }
            file.write_all(&buf[..n])
                .await
                .map_err(|e| TransferError::filesystem(&*path, e))?;
            if let Some(progress) = tracker.advance(n as u64) {
                self.publish_receiving(&name, progress);
            }
        }
        if let Some(progress) = tracker.finish() {
            self.publish_receiving(&name, progress);
        }

        file.flush()
            .await
            .map_err(|e| TransferError::filesystem(&*path, e))?;
        drop(file);

        Ok(Operation::Add {
            name,
            content: path,
            length,
        })
    }

    fn publish_receiving(&self, name: &str, progress: u8) {
        self.context.status.publish(
            self.id,
            TransferStatus::Receiving {
                name: name.to_string(),
                progress,
            },
        );
    }
}
