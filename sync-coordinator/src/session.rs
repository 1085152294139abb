//! The synchronized folder of one peer session.
//!
//! A `SyncSession` is created when the link comes up and dropped when it
//! goes down. Callers serialize access through the coordinator's folder
//! lock; the methods here do no locking of their own.

use std::io;
use std::path::{Path, PathBuf};
use sync_transfer::{Operation, TransferError};
use sync_types::validate_file_name;

use crate::error::{CoordinatorError, Result};

/// Peer address plus the folder shared with that peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSession {
    peer_address: String,
    folder: PathBuf,
}

impl SyncSession {
    /// Create a session value. Nothing touches the disk until [`prepare`](Self::prepare).
    pub fn new(peer_address: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            peer_address: peer_address.into(),
            folder: folder.into(),
        }
    }

    /// Address of the peer.
    pub fn peer_address(&self) -> &str {
        &self.peer_address
    }

    /// The synchronized folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Location of `name` inside the folder.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_file_name(name).map_err(TransferError::from)?;
        Ok(self.folder.join(name))
    }

    /// Recreate the folder empty, discarding anything left from earlier sessions.
    pub async fn prepare(&self) -> Result<()> {
        self.remove().await?;
        tokio::fs::create_dir_all(&self.folder)
            .await
            .map_err(|e| CoordinatorError::filesystem(&self.folder, e))?;
        tracing::debug!("Prepared sync folder {}", self.folder.display());
        Ok(())
    }

    /// Delete the folder and everything in it. Missing folder is fine.
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.folder).await {
            Ok(()) => {
                tracing::debug!("Removed sync folder {}", self.folder.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoordinatorError::filesystem(&self.folder, e)),
        }
    }

    /// Copy a local file into the folder, overwriting any file of the same name.
    ///
    /// Returns the path of the copy.
    pub async fn import(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoordinatorError::InvalidFile {
                path: source.to_path_buf(),
            })?;
        let target = self.path_for(name)?;

        if same_file(source, &target).await {
            return Ok(target);
        }
        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| CoordinatorError::filesystem(source, e))?;
        Ok(target)
    }

    /// Remove `name` from the folder. Returns whether a file was removed.
    pub async fn remove_file(&self, name: &str) -> Result<bool> {
        let target = self.path_for(name)?;
        remove_if_present(&target)
            .await
            .map_err(|e| CoordinatorError::filesystem(&target, e))
    }

    /// Apply an operation received from the peer.
    ///
    /// ADD copies the staged payload over `name`; DELETE of an absent file
    /// is a no-op.
    pub async fn apply(&self, operation: Operation) -> std::result::Result<(), TransferError> {
        match operation {
            Operation::Add {
                name,
                content,
                length,
            } => {
                let target = self.folder.join(&name);
                tokio::fs::copy(&content, &target)
                    .await
                    .map_err(|e| TransferError::filesystem(&target, e))?;
                tracing::info!("Stored {} ({} bytes)", name, length);
            }
            Operation::Delete { name } => {
                let target = self.folder.join(&name);
                let removed = remove_if_present(&target)
                    .await
                    .map_err(|e| TransferError::filesystem(&target, e))?;
                if removed {
                    tracing::info!("Deleted {}", name);
                } else {
                    tracing::debug!("Delete for absent file {}", name);
                }
            }
        }
        Ok(())
    }
}

async fn remove_if_present(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether both paths resolve to the same existing file.
async fn same_file(a: &Path, b: &Path) -> bool {
    match (
        tokio::fs::canonicalize(a).await,
        tokio::fs::canonicalize(b).await,
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
