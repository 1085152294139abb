//! Serve command - hold a sync session open until Ctrl-C.
//!
//! Plays the link layer: reports the peer as connected on start and as gone
//! on shutdown, so the folder exists only while the command runs.

use anyhow::{Context, Result};
use std::path::Path;
use sync_coordinator::{Config, SyncCoordinator};
use sync_types::TransferStatus;

/// Run the serve command.
pub async fn run(config: &Config, data_dir: &Path, peer: &str) -> Result<()> {
    let folder = config.sync.folder_or(data_dir);
    tokio::fs::create_dir_all(data_dir)
        .await
        .context("Failed to create data directory")?;

    let coordinator = SyncCoordinator::new(config.clone(), &folder);
    coordinator
        .on_connection_established(peer)
        .await
        .with_context(|| format!("Failed to start session with {peer}"))?;
    tracing::info!("Session with {} started", peer);

    if let Some(addr) = coordinator.server_addr().await {
        println!("Listening on {addr}");
    }
    println!("Synchronized folder: {}", coordinator.folder().display());
    println!("Press Ctrl-C to stop.");

    let mut events = coordinator.status().events();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.status {
                TransferStatus::Receiving { name, progress } => {
                    println!("  Receiving {name}: {progress}%");
                }
                TransferStatus::Success => println!("  [{}] done", event.id),
                TransferStatus::Error { message } => println!("  [{}] failed: {message}", event.id),
                _ => {}
            }
        }
    });

    let mut listing = coordinator.watch_listing();
    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => break signal.context("Failed to wait for Ctrl-C"),
            changed = listing.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let count = listing.borrow_and_update().len();
                println!("Folder now holds {count} file(s)");
            }
        }
    };

    println!("Stopping...");
    reporter.abort();
    coordinator
        .on_connection_terminated()
        .await
        .context("Failed to end session")?;
    tracing::info!("Session with {} ended", peer);
    result
}
