//! # sync-types
//!
//! Wire format types for the PeerSync folder synchronization protocol.
//!
//! This crate provides the foundational types used across all PeerSync crates:
//! - [`Opcode`], [`FrameHeader`] - The one-way ADD/DELETE frame format
//! - [`TransferStatus`], [`TransferEvent`], [`TransferId`] - Progress reporting
//! - [`SyncedFileRecord`] - One entry of the synchronized folder listing
//! - [`WireError`] - Error types
//!
//! ## Frame layout
//!
//! ```text
//! ADD:    writeUTF("ADD")    writeUTF(name)  int64 length  <length raw bytes>
//! DELETE: writeUTF("DELETE") writeUTF(name)
//! ```
//!
//! Strings use the Java `DataOutputStream.writeUTF` encoding (u16 big-endian
//! byte count followed by modified UTF-8), integers are big-endian.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod name;
mod record;
mod status;

pub use error::WireError;
pub use frame::{
    decode_modified_utf8, encode_modified_utf8, FrameHeader, Opcode, DEFAULT_CHUNK_SIZE,
    DEFAULT_PORT, MAX_UTF_LEN,
};
pub use name::{validate_file_name, MAX_FILE_NAME_LEN};
pub use record::SyncedFileRecord;
pub use status::{progress_percent, TransferEvent, TransferId, TransferStatus};
