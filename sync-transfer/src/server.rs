//! TransferServer - accepts inbound operations from the peer.
//!
//! One task runs the accept loop; every accepted connection is handled on
//! its own task while it holds a [`ConnectionLimits`] slot.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sync_types::{TransferId, TransferStatus};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::error::{Result, TransferError};
use crate::limits::ConnectionLimits;
use crate::operation::OperationSink;
use crate::session::{ServerContext, Session};
use crate::status::StatusPublisher;

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How often idle per-IP limiter entries are evicted.
const LIMITER_SHRINK_INTERVAL: Duration = Duration::from_secs(60);

/// A running listener.
///
/// Dropping the server stops the accept loop; [`TransferServer::stop`]
/// additionally waits until the listening socket is closed.
pub struct TransferServer {
    local_addr: SocketAddr,
    limits: ConnectionLimits,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TransferServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferServer")
            .field("local_addr", &self.local_addr)
            .field("limits", &self.limits)
            .field("stopped", &*self.shutdown.borrow())
            .finish()
    }
}

impl TransferServer {
    /// Bind the listener and start accepting connections.
    ///
    /// Every received operation is passed to `sink`; per-connection status
    /// goes to `status`.
    pub async fn start(
        config: &ServerConfig,
        sink: Arc<dyn OperationSink>,
        status: StatusPublisher,
    ) -> Result<Self> {
        let listener =
            TcpListener::bind(&config.bind_address)
                .await
                .map_err(|source| TransferError::Bind {
                    address: config.bind_address.clone(),
                    source,
                })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransferError::Bind {
                address: config.bind_address.clone(),
                source,
            })?;
        tracing::info!("Transfer server listening on {}", local_addr);

        let limits = ConnectionLimits::new(config);
        let context = Arc::new(ServerContext {
            config: config.clone(),
            sink,
            status,
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            context,
            limits.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            limits,
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently being handled.
    pub fn active_connections(&self) -> usize {
        self.limits.active()
    }

    /// Whether `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stop accepting connections.
    ///
    /// Returns once the listener is closed. Connections already being
    /// handled run to completion. Calling this again is a no-op.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let task = self
            .accept_task
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Accept loop ended abnormally: {}", e);
            }
            tracing::info!("Transfer server on {} stopped", self.local_addr);
        }
    }
}

impl Drop for TransferServer {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: Arc<ServerContext>,
    limits: ConnectionLimits,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut shrink = tokio::time::interval(LIMITER_SHRINK_INTERVAL);
    shrink.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = shrink.tick() => limits.shrink(),
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let permit = match limits
                        .check_rate(peer.ip())
                        .and_then(|()| limits.try_acquire())
                    {
                        Ok(permit) => permit,
                        Err(e) => {
                            // The peer gets no ack, so the rejection only shows up here
                            tracing::warn!("Rejected connection from {}: {}", peer, e);
                            context.status.publish(
                                TransferId::new(),
                                TransferStatus::Error {
                                    message: TransferError::Rejected(e).to_string(),
                                },
                            );
                            continue;
                        }
                    };

                    let context = Arc::clone(&context);
                    tokio::spawn(async move {
                        let _permit = permit;
                        // Failures are already logged and published by the session
                        let _ = Session::new(context, stream, peer).run().await;
                        tracing::debug!("Connection from {} closed", peer);
                    });
                }
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    context.status.publish(
                        TransferId::new(),
                        TransferStatus::Error {
                            message: format!("accept failed: {e}"),
                        },
                    );
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }
    // Listener drops here, closing the socket
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransferClient;
    use crate::config::ClientConfig;
    use crate::operation::Operation;
    use async_trait::async_trait;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::sync::{mpsc, Notify};

    /// Forwards operation names and ADD contents to a channel.
    struct ChannelSink {
        tx: mpsc::UnboundedSender<(String, Option<Vec<u8>>)>,
    }

    #[async_trait]
    impl OperationSink for ChannelSink {
        async fn apply(&self, operation: Operation) -> Result<()> {
            let entry = match operation {
                Operation::Add { name, content, .. } => {
                    let bytes = tokio::fs::read(&content).await.unwrap();
                    (name, Some(bytes))
                }
                Operation::Delete { name } => (name, None),
            };
            let _ = self.tx.send(entry);
            Ok(())
        }
    }

    /// Blocks every apply until released.
    struct GateSink {
        entered: mpsc::UnboundedSender<()>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl OperationSink for GateSink {
        async fn apply(&self, _operation: Operation) -> Result<()> {
            let _ = self.entered.send(());
            self.release.notified().await;
            Ok(())
        }
    }

    async fn start_channel_server(
        config: ServerConfig,
    ) -> (
        TransferServer,
        mpsc::UnboundedReceiver<(String, Option<Vec<u8>>)>,
        StatusPublisher,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = StatusPublisher::new();
        let server = TransferServer::start(&config, Arc::new(ChannelSink { tx }), status.clone())
            .await
            .unwrap();
        (server, rx, status)
    }

    #[tokio::test]
    async fn receives_file_from_client() {
        let staging = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            staging_dir: Some(staging.path().to_path_buf()),
            ..ServerConfig::loopback()
        };
        let (server, mut rx, status) = start_channel_server(config).await;

        let src = tempfile::tempdir().unwrap();
        let path = src.path().join("note.txt");
        std::fs::write(&path, vec![42u8; 4096]).unwrap();

        let client = TransferClient::tcp(ClientConfig::default(), StatusPublisher::new());
        client
            .send_file(&path, &server.local_addr().to_string())
            .await
            .unwrap();

        let (name, content) = rx.recv().await.unwrap();
        assert_eq!(name, "note.txt");
        assert_eq!(content, Some(vec![42u8; 4096]));

        // Success is published after apply returns
        let mut latest = status.subscribe();
        latest
            .wait_for(|s| *s == TransferStatus::Success)
            .await
            .unwrap();
        server.stop().await;
    }

    #[tokio::test]
    async fn receives_delete_from_client() {
        let (server, mut rx, _status) = start_channel_server(ServerConfig::loopback()).await;

        let client = TransferClient::tcp(ClientConfig::default(), StatusPublisher::new());
        client
            .send_delete("old.txt", &server.local_addr().to_string())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), ("old.txt".to_string(), None));
        server.stop().await;
    }

    #[tokio::test]
    async fn truncated_connection_publishes_error() {
        let (server, mut rx, status) = start_channel_server(ServerConfig::loopback()).await;
        let mut latest = status.subscribe();

        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        let mut frame = sync_types::FrameHeader::Add {
            name: "big.bin".into(),
            length: 1000,
        }
        .encode()
        .unwrap();
        frame.extend_from_slice(&[0u8; 10]);
        stream.write_all(&frame).await.unwrap();
        drop(stream);

        latest
            .wait_for(|s| matches!(s, TransferStatus::Error { .. }))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
        server.stop().await;
    }

    #[tokio::test]
    async fn connection_cap_turns_away_extra_connections() {
        let (entered_tx, mut entered) = mpsc::unbounded_channel();
        let release = Arc::new(Notify::new());
        let sink = Arc::new(GateSink {
            entered: entered_tx,
            release: release.clone(),
        });
        let config = ServerConfig {
            max_connections: 1,
            connections_per_minute: 0,
            ..ServerConfig::loopback()
        };
        let status = StatusPublisher::new();
        let server = TransferServer::start(&config, sink, status.clone())
            .await
            .unwrap();
        let peer = server.local_addr().to_string();
        let client = TransferClient::tcp(ClientConfig::default(), StatusPublisher::new());
        let mut latest = status.subscribe();

        // First connection occupies the only slot inside apply
        client.send_delete("a", &peer).await.unwrap();
        entered.recv().await.unwrap();
        assert_eq!(server.active_connections(), 1);

        // Second one is accepted by the OS but closed without being handled
        let frame = sync_types::FrameHeader::Delete { name: "b".into() }
            .encode()
            .unwrap();
        let mut second = TcpStream::connect(&peer).await.unwrap();
        let _ = second.write_all(&frame).await;
        let rejected = latest
            .wait_for(|s| matches!(s, TransferStatus::Error { .. }))
            .await
            .unwrap()
            .clone();
        assert!(matches!(
            rejected,
            TransferStatus::Error { message } if message.contains("connection limit reached")
        ));
        assert!(entered.try_recv().is_err());

        release.notify_one();
        server.stop().await;
    }

    #[tokio::test]
    async fn stop_closes_listener_and_is_idempotent() {
        let (server, _rx, _status) = start_channel_server(ServerConfig::loopback()).await;
        let addr = server.local_addr();

        server.stop().await;
        assert!(server.is_stopped());
        server.stop().await;

        assert!(TcpStream::connect(addr).await.is_err());
        // Port can be bound again once stop returns
        let rebound = TcpListener::bind(addr).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn bind_conflict_is_bind_error() {
        let (server, _rx, _status) = start_channel_server(ServerConfig::loopback()).await;
        let config = ServerConfig {
            bind_address: server.local_addr().to_string(),
            ..ServerConfig::default()
        };
        let (tx, _rx2) = mpsc::unbounded_channel();
        let err = TransferServer::start(&config, Arc::new(ChannelSink { tx }), StatusPublisher::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Bind { .. }));
        server.stop().await;
    }
}
