//! TransferClient - pushes single operations to the peer.
//!
//! Each call opens one connection, writes one frame and closes it. The
//! protocol has no acknowledgement: success means every byte was handed to
//! the transport, not that the peer applied the operation.
//!
//! # Example
//!
//! ```ignore
//! use sync_transfer::{ClientConfig, StatusPublisher, TransferClient};
//!
//! let client = TransferClient::tcp(ClientConfig::default(), StatusPublisher::new());
//! client.send_file(Path::new("note.txt"), "10.0.0.5").await?;
//! client.send_delete("old.txt", "10.0.0.5").await?;
//! ```
//!
//! The client never retries; callers decide whether a failure is worth
//! another attempt.

use std::path::Path;
use sync_core::ProgressTracker;
use sync_types::{validate_file_name, FrameHeader, TransferId, TransferStatus};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::write_header;
use crate::config::ClientConfig;
use crate::error::{Result, TransferError};
use crate::status::StatusPublisher;
use crate::transport::{TcpTransport, Transport};

/// Outcome of a completed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Identifier used for this transfer's status events.
    pub id: TransferId,
    /// Target file name.
    pub name: String,
    /// Payload bytes written (0 for DELETE).
    pub bytes: u64,
}

/// Sends ADD and DELETE frames to a peer.
pub struct TransferClient<T: Transport = TcpTransport> {
    config: ClientConfig,
    transport: T,
    status: StatusPublisher,
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for TransferClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferClient")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl TransferClient<TcpTransport> {
    /// Create a client over plain TCP.
    pub fn tcp(config: ClientConfig, status: StatusPublisher) -> Self {
        Self::new(config, TcpTransport::new(), status)
    }
}

impl<T: Transport> TransferClient<T> {
    /// Create a new TransferClient.
    pub fn new(config: ClientConfig, transport: T, status: StatusPublisher) -> Self {
        Self {
            config,
            transport,
            status,
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Status publisher this client reports to.
    pub fn status(&self) -> &StatusPublisher {
        &self.status
    }

    /// Send `path` to `peer` as an ADD frame.
    ///
    /// Publishes `Sending` progress while streaming, then `Success`; on
    /// failure publishes `Error` and returns the underlying error.
    pub async fn send_file(&self, path: &Path, peer: &str) -> Result<TransferReceipt> {
        let id = TransferId::new();
        let result = self.try_send_file(id, path, peer).await;
        self.finish(id, result)
    }

    /// Send a DELETE frame for `name` to `peer`.
    pub async fn send_delete(&self, name: &str, peer: &str) -> Result<TransferReceipt> {
        let id = TransferId::new();
        let result = self.try_send_delete(id, name, peer).await;
        self.finish(id, result)
    }

    async fn try_send_file(
        &self,
        id: TransferId,
        path: &Path,
        peer: &str,
    ) -> Result<TransferReceipt> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        validate_file_name(&name)?;

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| TransferError::filesystem(path, e))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| TransferError::filesystem(path, e))?
            .len();

        let header = FrameHeader::Add {
            name: name.clone(),
            length,
        };
        // Encode before connecting so a bad header never reaches the wire
        header.encode()?;

        let mut stream = self.open(peer).await?;
        tracing::debug!("Sending {} ({} bytes) to {}", name, length, peer);
        write_header(&mut stream, &header).await?;

        let mut tracker = ProgressTracker::new(length);
        let mut buf = vec![0u8; self.config.chunk_size()];
        while !tracker.is_complete() {
            let want = buf.len().min(usize::try_from(tracker.remaining()).unwrap_or(usize::MAX));
            let n = file
                .read(&mut buf[..want])
                .await
                .map_err(|e| TransferError::filesystem(path, e))?;
            if n == 0 {
                return Err(TransferError::filesystem(
                    path,
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!(
                            "file shrank during send ({} of {} bytes read)",
                            tracker.done(),
                            length
                        ),
                    ),
                ));
            }
            stream
                .write_all(&buf[..n])
                .await
                .map_err(TransferError::Connection)?;
            if let Some(progress) = tracker.advance(n as u64) {
                self.publish_sending(id, &name, progress);
            }
        }
        if let Some(progress) = tracker.finish() {
            self.publish_sending(id, &name, progress);
        }

        close(&mut stream).await?;
        tracing::info!("Sent {} ({} bytes) to {}", name, length, peer);

        Ok(TransferReceipt {
            id,
            name,
            bytes: length,
        })
    }

    async fn try_send_delete(
        &self,
        id: TransferId,
        name: &str,
        peer: &str,
    ) -> Result<TransferReceipt> {
        let header = FrameHeader::Delete {
            name: name.to_string(),
        };
        header.encode()?;

        let mut stream = self.open(peer).await?;
        write_header(&mut stream, &header).await?;
        close(&mut stream).await?;
        tracing::info!("Sent DELETE {} to {}", name, peer);

        Ok(TransferReceipt {
            id,
            name: name.to_string(),
            bytes: 0,
        })
    }

    async fn open(&self, peer: &str) -> Result<T::Stream> {
        let stream = self
            .transport
            .connect(peer, self.config.port, self.config.connect_timeout())
            .await?;
        Ok(stream)
    }

    fn publish_sending(&self, id: TransferId, name: &str, progress: u8) {
        self.status.publish(
            id,
            TransferStatus::Sending {
                name: name.to_string(),
                progress,
            },
        );
    }

    fn finish(
        &self,
        id: TransferId,
        result: Result<TransferReceipt>,
    ) -> Result<TransferReceipt> {
        match &result {
            Ok(_) => self.status.publish(id, TransferStatus::Success),
            Err(e) => {
                tracing::warn!("Transfer {} failed: {}", id, e);
                self.status.publish(
                    id,
                    TransferStatus::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
        result
    }
}

async fn close<S>(stream: &mut S) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.flush().await.map_err(TransferError::Connection)?;
    stream.shutdown().await.map_err(TransferError::Connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::MockTransport;

    fn client(transport: MockTransport, chunk_size: usize) -> TransferClient<MockTransport> {
        let config = ClientConfig {
            chunk_size,
            ..ClientConfig::default()
        };
        TransferClient::new(config, transport, StatusPublisher::new())
    }

    fn drain(events: &mut tokio::sync::broadcast::Receiver<sync_types::TransferEvent>) -> Vec<TransferStatus> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event.status);
        }
        out
    }

    #[tokio::test]
    async fn send_file_writes_add_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        let content: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        let transport = MockTransport::new();
        let client = client(transport.clone(), 1000);
        let receipt = client.send_file(&path, "10.0.0.5").await.unwrap();
        assert_eq!(receipt.name, "note.txt");
        assert_eq!(receipt.bytes, 4096);

        let sent = transport.last_sent().unwrap();
        let (header, used) = FrameHeader::decode(&sent).unwrap();
        assert_eq!(
            header,
            FrameHeader::Add {
                name: "note.txt".into(),
                length: 4096
            }
        );
        assert_eq!(&sent[used..], content.as_slice());
        assert_eq!(transport.attempted_addresses(), vec!["10.0.0.5".to_string()]);
    }

    #[tokio::test]
    async fn send_file_reports_progress_then_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, vec![7u8; 4096]).unwrap();

        let client = client(MockTransport::new(), 1024);
        let mut events = client.status().events();
        client.send_file(&path, "10.0.0.5").await.unwrap();

        let statuses = drain(&mut events);
        let progress: Vec<u8> = statuses.iter().filter_map(|s| s.progress()).collect();
        assert_eq!(progress, vec![25, 50, 75, 100]);
        assert_eq!(statuses.last(), Some(&TransferStatus::Success));
        assert_eq!(client.status().latest(), TransferStatus::Success);
    }

    #[tokio::test]
    async fn empty_file_reports_full_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let transport = MockTransport::new();
        let client = client(transport.clone(), 8192);
        let mut events = client.status().events();
        client.send_file(&path, "peer").await.unwrap();

        let statuses = drain(&mut events);
        assert_eq!(
            statuses,
            vec![
                TransferStatus::Sending {
                    name: "empty".into(),
                    progress: 100
                },
                TransferStatus::Success
            ]
        );
        let (_, used) = FrameHeader::decode(&transport.last_sent().unwrap()).unwrap();
        assert_eq!(used, transport.last_sent().unwrap().len());
    }

    #[tokio::test]
    async fn connect_failure_surfaces_and_publishes_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();

        let transport = MockTransport::new();
        transport.fail_next_connect("no route to host");
        let client = client(transport.clone(), 8192);

        let err = client.send_file(&path, "10.0.0.5").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(matches!(client.status().latest(), TransferStatus::Error { .. }));
        // The client itself never retries
        assert_eq!(transport.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn reset_mid_stream_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![1u8; 10_000]).unwrap();

        let transport = MockTransport::new();
        transport.fail_writes_after(100);
        let client = client(transport, 1024);
        let mut events = client.status().events();

        let err = client.send_file(&path, "peer").await.unwrap_err();
        assert!(matches!(err, TransferError::Connection(_)));

        let statuses = drain(&mut events);
        assert!(statuses.iter().all(|s| s.progress() != Some(100)));
        assert!(matches!(statuses.last(), Some(TransferStatus::Error { .. })));
    }

    #[tokio::test]
    async fn missing_local_file_is_filesystem_error() {
        let transport = MockTransport::new();
        let client = client(transport.clone(), 8192);
        let err = client
            .send_file(Path::new("/nonexistent/dir/file.txt"), "peer")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filesystem);
        assert_eq!(transport.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn send_delete_writes_delete_frame() {
        let transport = MockTransport::new();
        let client = client(transport.clone(), 8192);
        let receipt = client.send_delete("old.txt", "10.0.0.5").await.unwrap();
        assert_eq!(receipt.bytes, 0);

        let sent = transport.last_sent().unwrap();
        let (header, used) = FrameHeader::decode(&sent).unwrap();
        assert_eq!(
            header,
            FrameHeader::Delete {
                name: "old.txt".into()
            }
        );
        assert_eq!(used, sent.len());
        assert_eq!(client.status().latest(), TransferStatus::Success);
    }

    #[tokio::test]
    async fn invalid_delete_name_never_connects() {
        let transport = MockTransport::new();
        let client = client(transport.clone(), 8192);
        let err = client.send_delete("../escape", "peer").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(transport.connect_attempts(), 0);
    }
}
