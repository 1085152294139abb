//! Push files to a peer.

use anyhow::{bail, Result};
use std::path::PathBuf;
use sync_coordinator::retry::with_retry;
use sync_coordinator::Config;
use sync_transfer::{StatusPublisher, TransferClient};
use sync_types::TransferStatus;

/// Run the push command.
///
/// Every file is attempted even when an earlier one fails.
pub async fn run(config: &Config, peer: &str, files: &[PathBuf]) -> Result<()> {
    let status = StatusPublisher::new();
    let client = TransferClient::tcp(config.client.clone(), status.clone());
    let policy = config.sync.retry_policy();

    let mut events = status.events();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let TransferStatus::Sending { name, progress } = event.status {
                println!("  Sending {name}: {progress}%");
            }
        }
    });

    tracing::debug!("Pushing {} file(s) to {}", files.len(), peer);
    let mut failed = 0;
    for path in files {
        // Missing files fail fast instead of going through the retry loop
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                tracing::warn!("Skipping {}: not a regular file", path.display());
                eprintln!("{} is not a file", path.display());
                failed += 1;
                continue;
            }
            Err(e) => {
                eprintln!("Cannot read {}: {e}", path.display());
                failed += 1;
                continue;
            }
        };

        println!("Pushing {} ({} bytes) to {peer}...", path.display(), metadata.len());
        let label = format!("Sending {}", path.display());
        match with_retry(&policy, &label, |_| client.send_file(path, peer)).await {
            Ok(receipt) => println!("Sent {} ({} bytes)", receipt.name, receipt.bytes),
            Err(e) => {
                eprintln!("Failed to send {}: {e}", path.display());
                failed += 1;
            }
        }
    }
    reporter.abort();

    if failed > 0 {
        bail!("Push completed with errors ({failed} of {} failed)", files.len());
    }
    Ok(())
}
