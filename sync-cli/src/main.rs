//! # peersync
//!
//! Command-line peer for PeerSync.
//!
//! ## Commands
//!
//! - `serve`: Start a sync session with a peer and receive its files
//! - `push`: Send files to a peer
//! - `delete`: Tell a peer to delete a file
//!
//! ## Example
//!
//! ```bash
//! # On the receiving machine
//! peersync serve --peer 192.168.49.1
//!
//! # On the sending machine
//! peersync push --peer 192.168.49.2 notes.txt photo.jpg
//! peersync delete --peer 192.168.49.2 photo.jpg
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use sync_coordinator::Config;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{delete, push, serve};

/// Config file looked up in the data directory when `--config` is not given.
const CONFIG_FILE_NAME: &str = "peersync.toml";

/// Command-line peer for PeerSync.
#[derive(Parser, Debug)]
#[command(name = "peersync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the synchronized folder
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a session with a peer and receive its operations until Ctrl-C
    Serve {
        /// Address of the peer
        #[arg(long)]
        peer: String,
    },

    /// Send files to a peer
    Push {
        /// Peer address, optionally with a port (default port 8888)
        #[arg(long)]
        peer: String,

        /// Files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a peer to delete a file from its synchronized folder
    Delete {
        /// Peer address, optionally with a port (default port 8888)
        #[arg(long)]
        peer: String,

        /// File name to delete
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    tracing::debug!("Data directory: {}", data_dir.display());
    let config = load_config(cli.config.as_deref(), &data_dir)?;

    match cli.command {
        Commands::Serve { peer } => {
            serve::run(&config, &data_dir, &peer).await?;
        }
        Commands::Push { peer, files } => {
            push::run(&config, &peer, &files).await?;
        }
        Commands::Delete { peer, name } => {
            delete::run(&config, &peer, &name).await?;
        }
    }

    Ok(())
}

/// Log to stderr so command output on stdout stays clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit `--config` must exist; the default location is optional.
fn load_config(explicit: Option<&Path>, data_dir: &Path) -> Result<Config> {
    let config = match explicit {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::from_file(path)?
        }
        None => Config::load_or_default(&data_dir.join(CONFIG_FILE_NAME))?,
    };
    Ok(config)
}

/// Get the default data directory for peersync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "peersync", "peersync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
