//! Transport abstraction for outbound transfers.
//!
//! This module provides a pluggable connection layer for
//! [`TransferClient`](crate::TransferClient): real TCP for production, an
//! in-memory mock for tests.
//!
//! # Design
//!
//! A transport only knows how to open a writable byte stream to a peer.
//! Framing, chunking and progress reporting stay in the client, so every
//! transport produces byte-identical frames.

mod mock;
mod tcp;

pub use mock::{MockStream, MockTransport};
pub use tcp::TcpTransport;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWrite;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed (refused, unreachable, DNS).
    #[error("connection to {address} failed: {source}")]
    ConnectionFailed {
        /// Peer address as given.
        address: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Connection timeout.
    #[error("connection to {address} timed out after {timeout:?}")]
    Timeout {
        /// Peer address as given.
        address: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },
}

/// Opens outbound streams to a peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stream type produced by a successful connect.
    type Stream: AsyncWrite + Unpin + Send;

    /// Connect to `address`.
    ///
    /// `address` is an IP, a hostname, or a full `host:port`; `default_port`
    /// applies when it carries no port. Fails with
    /// [`TransportError::Timeout`] if not connected within `timeout`.
    async fn connect(
        &self,
        address: &str,
        default_port: u16,
        timeout: Duration,
    ) -> Result<Self::Stream, TransportError>;
}
