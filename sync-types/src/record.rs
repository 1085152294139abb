//! Synchronized folder listing entries.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file currently present in the synchronized folder.
///
/// Always derived by enumerating the folder; never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedFileRecord {
    /// File name (no directory component).
    pub name: String,
    /// Size on disk in bytes.
    pub size_bytes: u64,
    /// Last modification time, milliseconds since the Unix epoch.
    pub last_modified_epoch_ms: u64,
    /// Absolute path of the file.
    pub absolute_path: PathBuf,
}
