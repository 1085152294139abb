//! Folder enumeration.

use std::path::Path;
use std::time::UNIX_EPOCH;
use sync_types::SyncedFileRecord;

/// Enumerate regular files in `folder`, sorted by name.
///
/// A folder that does not exist yields an empty listing.
pub async fn enumerate(folder: &Path) -> std::io::Result<Vec<SyncedFileRecord>> {
    let mut entries = match tokio::fs::read_dir(folder).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut records = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            // Removed between read_dir and stat
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!("Skipping non UTF-8 file name {:?}", entry.file_name());
            continue;
        };

        let last_modified_epoch_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);

        records.push(SyncedFileRecord {
            name,
            size_bytes: metadata.len(),
            last_modified_epoch_ms,
            absolute_path: entry.path(),
        });
    }

    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = enumerate(&dir.path().join("absent")).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn lists_files_sorted_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let records = enumerate(dir.path()).await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(records[1].size_bytes, 2);
        assert_eq!(records[0].absolute_path, dir.path().join("a.txt"));
        assert!(records[0].last_modified_epoch_ms > 0);
    }
}
