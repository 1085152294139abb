//! Error types for the PeerSync wire format.

use thiserror::Error;

/// Errors produced while encoding or decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Opcode string is neither `ADD` nor `DELETE`.
    #[error("unknown opcode: {0:?}")]
    UnknownOpcode(String),

    /// Encoded string exceeds the u16 length prefix.
    #[error("string too long for wire encoding: {len} bytes (max {max})")]
    StringTooLong {
        /// Encoded length in bytes.
        len: usize,
        /// Maximum encodable length.
        max: usize,
    },

    /// Bytes are not valid modified UTF-8.
    #[error("malformed string: {0}")]
    MalformedString(String),

    /// Declared payload length is negative.
    #[error("invalid payload length: {0}")]
    InvalidLength(i64),

    /// File name cannot be used inside a flat folder.
    #[error("invalid file name {name:?}: {reason}")]
    InvalidFileName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Buffer ended before a complete header was read.
    #[error("incomplete frame: need {needed} more bytes")]
    Incomplete {
        /// Minimum number of additional bytes required.
        needed: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::UnknownOpcode("PUT".into());
        assert_eq!(err.to_string(), "unknown opcode: \"PUT\"");

        let err = WireError::InvalidLength(-1);
        assert_eq!(err.to_string(), "invalid payload length: -1");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
