//! Ask a peer to delete a file.

use anyhow::{Context, Result};
use sync_coordinator::retry::with_retry;
use sync_coordinator::Config;
use sync_transfer::{StatusPublisher, TransferClient};
use sync_types::validate_file_name;

/// Run the delete command.
pub async fn run(config: &Config, peer: &str, name: &str) -> Result<()> {
    validate_file_name(name).with_context(|| format!("Cannot delete {name:?}"))?;

    let client = TransferClient::tcp(config.client.clone(), StatusPublisher::new());
    let policy = config.sync.retry_policy();
    let label = format!("Deleting {name}");
    tracing::debug!("Sending DELETE {} to {}", name, peer);

    with_retry(&policy, &label, |_| client.send_delete(name, peer))
        .await
        .with_context(|| format!("Failed to send DELETE {name} to {peer}"))?;
    println!("Sent DELETE {name} to {peer}");
    Ok(())
}
