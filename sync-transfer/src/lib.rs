//! # sync-transfer
//!
//! Point-to-point transfer engine for PeerSync.
//!
//! This crate moves single ADD/DELETE operations between two peers:
//! - [`TransferServer`] accepts inbound TCP connections, parses one frame per
//!   connection, stages ADD payloads in a temporary file and hands the
//!   resulting [`Operation`] to an [`OperationSink`]
//! - [`TransferClient`] opens an outbound connection through a pluggable
//!   [`Transport`] and streams one frame
//! - [`StatusPublisher`] exposes the latest [`TransferStatus`] plus an ordered
//!   event stream tagged by transfer
//!
//! ## Architecture
//!
//! ```text
//!  Peer A                                         Peer B
//! ┌────────────────┐   ADD/DELETE frame (TCP)   ┌────────────────┐
//! │ TransferClient ├───────────────────────────►│ TransferServer │
//! └───────┬────────┘        one-way, no ack     └───────┬────────┘
//!         │                                             │ Operation
//!         ▼                                             ▼
//!   StatusPublisher                               OperationSink
//! ```
//!
//! [`TransferStatus`]: sync_types::TransferStatus

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod limits;
pub mod operation;
pub mod server;
pub mod session;
pub mod status;
pub mod transport;

pub use client::{TransferClient, TransferReceipt};
pub use config::{ClientConfig, ServerConfig};
pub use error::{ErrorKind, ProtocolError, TransferError};
pub use limits::{ConnectionLimits, RateLimitError};
pub use operation::{Operation, OperationSink};
pub use server::TransferServer;
pub use status::StatusPublisher;
pub use transport::{MockTransport, TcpTransport, Transport, TransportError};
