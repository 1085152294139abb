//! Frame header encoding for the ADD/DELETE protocol.
//!
//! A frame is a header (opcode, file name, and for ADD the payload length)
//! followed by the raw payload. Only the header is modelled here; payload
//! bytes are streamed by the transfer layer.

use std::fmt;

use crate::{validate_file_name, WireError};

/// Well-known TCP port both peers listen on.
pub const DEFAULT_PORT: u16 = 8888;

/// Default chunk size for streaming payloads.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Maximum encoded length of a wire string (u16 length prefix).
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

/// Operation discriminator sent as the first string of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Create or overwrite a file.
    Add,
    /// Remove a file.
    Delete,
}

impl Opcode {
    /// The exact string written on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Delete => "DELETE",
        }
    }

    /// Parse a wire opcode. Matching is case-sensitive.
    pub fn parse(s: &str) -> Result<Self, WireError> {
        match s {
            "ADD" => Ok(Self::Add),
            "DELETE" => Ok(Self::Delete),
            other => Err(WireError::UnknownOpcode(other.to_string())),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header of a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameHeader {
    /// ADD header; exactly `length` payload bytes follow.
    Add {
        /// Target file name inside the synchronized folder.
        name: String,
        /// Declared payload length in bytes.
        length: u64,
    },
    /// DELETE header; no payload follows.
    Delete {
        /// Target file name inside the synchronized folder.
        name: String,
    },
}

impl FrameHeader {
    /// The opcode of this header.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Add { .. } => Opcode::Add,
            Self::Delete { .. } => Opcode::Delete,
        }
    }

    /// The target file name.
    pub fn name(&self) -> &str {
        match self {
            Self::Add { name, .. } | Self::Delete { name } => name,
        }
    }

    /// Build a header from its parsed parts, validating the name and the
    /// declared length.
    pub fn from_parts(
        opcode: Opcode,
        name: String,
        length: Option<i64>,
    ) -> Result<Self, WireError> {
        validate_file_name(&name)?;
        match opcode {
            Opcode::Add => {
                let raw = length.ok_or(WireError::Incomplete { needed: 8 })?;
                let length = u64::try_from(raw).map_err(|_| WireError::InvalidLength(raw))?;
                Ok(Self::Add { name, length })
            }
            Opcode::Delete => Ok(Self::Delete { name }),
        }
    }

    /// Encode the header to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        validate_file_name(self.name())?;
        let mut out = Vec::with_capacity(16 + self.name().len());
        write_utf(&mut out, self.opcode().as_str())?;
        write_utf(&mut out, self.name())?;
        if let Self::Add { length, .. } = self {
            let length = i64::try_from(*length).map_err(|_| WireError::InvalidLength(-1))?;
            out.extend_from_slice(&length.to_be_bytes());
        }
        Ok(out)
    }

    /// Decode a header from the front of `buf`.
    ///
    /// Returns the header and the number of bytes consumed. Any bytes after
    /// that are payload.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WireError> {
        let mut pos = 0;
        let opcode = Opcode::parse(&read_utf(buf, &mut pos)?)?;
        let name = read_utf(buf, &mut pos)?;
        let length = match opcode {
            Opcode::Add => {
                let bytes = take(buf, &mut pos, 8)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(bytes);
                Some(i64::from_be_bytes(arr))
            }
            Opcode::Delete => None,
        };
        Ok((Self::from_parts(opcode, name, length)?, pos))
    }
}

fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<(), WireError> {
    let encoded = encode_modified_utf8(s)?;
    out.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

fn read_utf(buf: &[u8], pos: &mut usize) -> Result<String, WireError> {
    let len_bytes = take(buf, pos, 2)?;
    let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    decode_modified_utf8(take(buf, pos, len)?)
}

fn take<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], WireError> {
    let available = buf.len().saturating_sub(*pos);
    if available < n {
        return Err(WireError::Incomplete {
            needed: n - available,
        });
    }
    let slice = &buf[*pos..*pos + n];
    *pos += n;
    Ok(slice)
}

/// Encode a string as Java modified UTF-8 (without the length prefix).
///
/// NUL becomes `C0 80` and characters outside the BMP are written as two
/// three-byte surrogate encodings.
pub fn encode_modified_utf8(s: &str) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    if out.len() > MAX_UTF_LEN {
        return Err(WireError::StringTooLong {
            len: out.len(),
            max: MAX_UTF_LEN,
        });
    }
    Ok(out)
}

/// Decode Java modified UTF-8 bytes (without the length prefix).
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, WireError> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        let unit = match b0 >> 4 {
            0x0..=0x7 => {
                i += 1;
                u16::from(b0)
            }
            0xC | 0xD => {
                let b1 = continuation(bytes, i + 1)?;
                i += 2;
                (u16::from(b0 & 0x1F) << 6) | u16::from(b1 & 0x3F)
            }
            0xE => {
                let b1 = continuation(bytes, i + 1)?;
                let b2 = continuation(bytes, i + 2)?;
                i += 3;
                (u16::from(b0 & 0x0F) << 12) | (u16::from(b1 & 0x3F) << 6) | u16::from(b2 & 0x3F)
            }
            _ => {
                return Err(WireError::MalformedString(format!(
                    "invalid lead byte 0x{b0:02x} at offset {i}"
                )))
            }
        };
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|e| WireError::MalformedString(e.to_string()))
}

fn continuation(bytes: &[u8], at: usize) -> Result<u8, WireError> {
    match bytes.get(at) {
        Some(b) if b & 0xC0 == 0x80 => Ok(*b),
        Some(b) => Err(WireError::MalformedString(format!(
            "invalid continuation byte 0x{b:02x} at offset {at}"
        ))),
        None => Err(WireError::MalformedString(
            "truncated multi-byte sequence".to_string(),
        )),
    }
}
