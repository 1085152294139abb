//! Async frame header I/O.
//!
//! The byte layout lives in `sync-types`; this module reads and writes it on
//! tokio streams so the server never buffers more than one header.

use sync_types::{decode_modified_utf8, FrameHeader, Opcode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result, TransferError};

/// Read one frame header.
pub async fn read_header<R>(reader: &mut R) -> Result<FrameHeader>
where
    R: AsyncRead + Unpin,
{
    let opcode = Opcode::parse(&read_utf(reader).await?)?;
    let name = read_utf(reader).await?;
    let length = match opcode {
        Opcode::Add => Some(reader.read_i64().await.map_err(read_error)?),
        Opcode::Delete => None,
    };
    Ok(FrameHeader::from_parts(opcode, name, length)?)
}

/// Write one frame header.
pub async fn write_header<W>(writer: &mut W, header: &FrameHeader) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = header.encode()?;
    writer
        .write_all(&bytes)
        .await
        .map_err(TransferError::Connection)
}

async fn read_utf<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u16().await.map_err(read_error)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(read_error)?;
    Ok(decode_modified_utf8(&buf)?)
}

fn read_error(e: std::io::Error) -> TransferError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::TruncatedHeader.into()
    } else {
        TransferError::Connection(e)
    }
}
