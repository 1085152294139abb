//! SyncCoordinator - owns the session lifecycle and the synchronized folder.
//!
//! Link events go through the pure [`SessionState`] machine; the returned
//! [`SessionAction`]s are executed here in order. Every write to the folder
//! (received operations, pre-send copies, local deletes) holds the folder
//! lock, so two writers never race on one file name.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use sync_core::{LinkEvent, RetryPolicy, SessionAction, SessionState};
use sync_transfer::{
    Operation, OperationSink, StatusPublisher, TcpTransport, TransferClient, TransferError,
    TransferReceipt, TransferServer, Transport,
};
use sync_types::{SyncedFileRecord, TransferStatus};
use tokio::sync::{watch, Mutex};

use crate::config::Config;
use crate::error::{CoordinatorError, Result};
use crate::listing;
use crate::retry::with_retry;
use crate::session::SyncSession;

/// Result of a single outgoing sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The operation reached the peer.
    Sent(TransferReceipt),
    /// The copy in the folder was already at least as new; nothing sent.
    Skipped,
    /// No session is active; nothing was done.
    NotConnected,
}

/// Summary of a batch sync.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    /// Files that reached the peer.
    pub synced: Vec<String>,
    /// Files skipped as unchanged, or because no session was active.
    pub skipped: Vec<String>,
    /// Files that failed after all attempts, with the last error message.
    pub failed: Vec<(PathBuf, String)>,
}

impl SyncReport {
    /// Whether every file was synced or skipped.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Lifecycle state guarded by one lock.
#[derive(Default)]
struct Link {
    state: SessionState,
    session: Option<SyncSession>,
    sink: Option<Arc<FolderSink>>,
    server: Option<TransferServer>,
}

/// Coordinates one peer session at a time.
pub struct SyncCoordinator<T: Transport = TcpTransport> {
    config: Config,
    folder: PathBuf,
    client: TransferClient<T>,
    status: StatusPublisher,
    retry: RetryPolicy,
    link: Mutex<Link>,
    folder_lock: Arc<Mutex<()>>,
    listing: Arc<watch::Sender<Vec<SyncedFileRecord>>>,
}

impl<T: Transport> std::fmt::Debug for SyncCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("folder", &self.folder)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator<TcpTransport> {
    /// Create a coordinator that talks plain TCP.
    pub fn new(config: Config, folder: impl Into<PathBuf>) -> Self {
        Self::with_transport(config, folder, TcpTransport::new())
    }
}

impl<T: Transport> SyncCoordinator<T> {
    /// Create a coordinator with a custom outbound transport.
    pub fn with_transport(config: Config, folder: impl Into<PathBuf>, transport: T) -> Self {
        let status = StatusPublisher::new();
        let client = TransferClient::new(config.client.clone(), transport, status.clone());
        let (listing, _) = watch::channel(Vec::new());
        let folder = folder.into();
        // Listing records carry absolute paths
        let folder = std::path::absolute(&folder).unwrap_or(folder);
        Self {
            retry: config.sync.retry_policy(),
            folder,
            client,
            status,
            config,
            link: Mutex::new(Link::default()),
            folder_lock: Arc::new(Mutex::new(())),
            listing: Arc::new(listing),
        }
    }

    /// The synchronized folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Transfer status shared by the server and the client.
    pub fn status(&self) -> &StatusPublisher {
        &self.status
    }

    /// Latest transfer status.
    pub fn latest_status(&self) -> TransferStatus {
        self.status.latest()
    }

    /// Outbound client, mainly for inspecting the transport in tests.
    pub fn client(&self) -> &TransferClient<T> {
        &self.client
    }

    /// Whether a session is active.
    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.state.is_connected()
    }

    /// Peer of the active session.
    pub async fn peer_address(&self) -> Option<String> {
        self.link.lock().await.state.peer_address().map(str::to_string)
    }

    /// Address of the inbound listener while a session is active.
    pub async fn server_addr(&self) -> Option<SocketAddr> {
        self.link
            .lock()
            .await
            .server
            .as_ref()
            .map(TransferServer::local_addr)
    }

    /// The link layer reports a connection to `peer_address`.
    ///
    /// Recreates the folder empty and starts the listener. A second call
    /// replaces the running session. If setup fails the coordinator ends up
    /// disconnected.
    pub async fn on_connection_established(&self, peer_address: &str) -> Result<()> {
        tracing::info!("Connection established with {}", peer_address);
        let mut link = self.link.lock().await;
        let (state, actions) = std::mem::take(&mut link.state).on_event(LinkEvent::Established {
            peer_address: peer_address.to_string(),
        });
        link.state = state;

        if let Err(e) = self.run_actions(&mut link, actions).await {
            tracing::error!("Session setup for {} failed: {}", peer_address, e);
            let (state, actions) = std::mem::take(&mut link.state).on_event(LinkEvent::Terminated);
            link.state = state;
            if let Err(cleanup) = self.run_actions(&mut link, actions).await {
                tracing::warn!("Cleanup after failed setup failed: {}", cleanup);
            }
            return Err(e);
        }
        Ok(())
    }

    /// The link layer reports the connection is gone.
    ///
    /// Stops the listener and deletes the folder. No-op when disconnected.
    pub async fn on_connection_terminated(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        if link.state.is_connected() {
            tracing::info!("Connection terminated");
        }
        let (state, actions) = std::mem::take(&mut link.state).on_event(LinkEvent::Terminated);
        link.state = state;
        self.run_actions(&mut link, actions).await
    }

    async fn run_actions(&self, link: &mut Link, actions: Vec<SessionAction>) -> Result<()> {
        for action in actions {
            tracing::trace!("Running {:?}", action);
            match action {
                SessionAction::StopServer => {
                    if let Some(server) = link.server.take() {
                        server.stop().await;
                    }
                }
                SessionAction::RemoveFolder => {
                    let _guard = self.folder_lock.lock().await;
                    if let Some(sink) = link.sink.take() {
                        sink.close();
                    }
                    if let Some(session) = link.session.take() {
                        session.remove().await?;
                    }
                }
                SessionAction::PrepareFolder => {
                    let Some(peer_address) = link.state.peer_address() else {
                        continue;
                    };
                    let session = SyncSession::new(peer_address, &self.folder);
                    let _guard = self.folder_lock.lock().await;
                    session.prepare().await?;
                    link.session = Some(session);
                }
                SessionAction::StartServer => {
                    let Some(session) = link.session.clone() else {
                        continue;
                    };
                    let sink = Arc::new(FolderSink {
                        session,
                        folder_lock: Arc::clone(&self.folder_lock),
                        open: AtomicBool::new(true),
                        listing: Arc::clone(&self.listing),
                    });
                    let server = TransferServer::start(
                        &self.config.server,
                        Arc::clone(&sink) as Arc<dyn OperationSink>,
                        self.status.clone(),
                    )
                    .await?;
                    link.sink = Some(sink);
                    link.server = Some(server);
                }
                SessionAction::PublishListing => self.refresh_listing().await,
            }
        }
        Ok(())
    }

    /// Copy `path` into the folder and push it to `peer`.
    ///
    /// Sends are retried per the configured policy; after the last failed
    /// attempt its error is returned. Does nothing when no session is active.
    pub async fn sync_file(&self, path: &Path, peer: &str) -> Result<SyncOutcome> {
        let Some(session) = self.current_session().await else {
            tracing::debug!("Not connected, skipping {}", path.display());
            return Ok(SyncOutcome::NotConnected);
        };

        {
            let _guard = self.folder_lock.lock().await;
            if self.config.sync.skip_unchanged && self.copy_is_current(&session, path).await? {
                tracing::debug!("Skipping {}: copy in folder is newer or same age", path.display());
                return Ok(SyncOutcome::Skipped);
            }
            session.import(path).await?;
        }

        // Send from the caller's file: the folder copy is open to inbound ADDs
        // once the lock is released
        let label = format!("Sending {}", path.display());
        let result = with_retry(&self.retry, &label, |_| self.client.send_file(path, peer)).await;
        self.refresh_listing().await;
        Ok(SyncOutcome::Sent(result?))
    }

    /// Push every file in `paths`, continuing past failures.
    pub async fn sync_files<I, P>(&self, paths: I, peer: &str) -> SyncReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = SyncReport::default();
        for path in paths {
            let path = path.as_ref();
            let shown = path.display().to_string();
            match self.sync_file(path, peer).await {
                Ok(SyncOutcome::Sent(receipt)) => report.synced.push(receipt.name),
                Ok(SyncOutcome::Skipped | SyncOutcome::NotConnected) => report.skipped.push(shown),
                Err(e) => {
                    tracing::error!("Error syncing {}: {}", shown, e);
                    report.failed.push((path.to_path_buf(), e.to_string()));
                }
            }
        }
        if !report.is_clean() {
            tracing::warn!("Sync completed with errors ({} failed)", report.failed.len());
        }
        report
    }

    /// Remove `name` from the folder and tell `peer` to do the same.
    pub async fn delete_file(&self, name: &str, peer: &str) -> Result<SyncOutcome> {
        let Some(session) = self.current_session().await else {
            return Ok(SyncOutcome::NotConnected);
        };

        {
            let _guard = self.folder_lock.lock().await;
            session.remove_file(name).await?;
        }
        self.refresh_listing().await;

        let label = format!("Deleting {name}");
        let receipt = with_retry(&self.retry, &label, |_| self.client.send_delete(name, peer)).await?;
        Ok(SyncOutcome::Sent(receipt))
    }

    /// Snapshot of the folder contents, sorted by name.
    pub async fn listing(&self) -> Result<Vec<SyncedFileRecord>> {
        listing::enumerate(&self.folder)
            .await
            .map_err(|e| CoordinatorError::filesystem(&self.folder, e))
    }

    /// Live folder listing, updated after every change.
    pub fn watch_listing(&self) -> watch::Receiver<Vec<SyncedFileRecord>> {
        self.listing.subscribe()
    }

    async fn refresh_listing(&self) {
        publish_listing(&self.folder, &self.listing).await;
    }

    async fn current_session(&self) -> Option<SyncSession> {
        self.link.lock().await.session.clone()
    }

    async fn copy_is_current(&self, session: &SyncSession, source: &Path) -> Result<bool> {
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            return Ok(false);
        };
        let target = session.path_for(name)?;
        let source_modified = tokio::fs::metadata(source)
            .await
            .and_then(|m| m.modified())
            .map_err(|e| CoordinatorError::filesystem(source, e))?;
        match tokio::fs::metadata(&target).await.and_then(|m| m.modified()) {
            Ok(target_modified) => Ok(target_modified >= source_modified),
            Err(_) => Ok(false),
        }
    }
}

async fn publish_listing(folder: &Path, listing: &watch::Sender<Vec<SyncedFileRecord>>) {
    match listing::enumerate(folder).await {
        Ok(records) => {
            listing.send_replace(records);
        }
        Err(e) => tracing::warn!("Failed to list {}: {}", folder.display(), e),
    }
}

/// Applies operations received by the server to one session's folder.
struct FolderSink {
    session: SyncSession,
    folder_lock: Arc<Mutex<()>>,
    /// Cleared when the session ends; late operations are refused.
    open: AtomicBool,
    listing: Arc<watch::Sender<Vec<SyncedFileRecord>>>,
}

impl FolderSink {
    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl OperationSink for FolderSink {
    async fn apply(&self, operation: Operation) -> std::result::Result<(), TransferError> {
        {
            let _guard = self.folder_lock.lock().await;
            if !self.open.load(Ordering::SeqCst) {
                return Err(TransferError::filesystem(
                    self.session.folder(),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "sync session has ended"),
                ));
            }
            self.session.apply(operation).await?;
        }
        publish_listing(self.session.folder(), &self.listing).await;
        Ok(())
    }
}
