// src/server/wire.rs

//! Length-framed document transport.
//!
//! Every message on the wire is a 4-byte big-endian payload length
//! followed by a gzip-compressed document. Full packs are stored on
//! disk in exactly the payload encoding, so file responses are framed
//! straight from disk without recompression.

use crate::doc::Node;
use crate::error::{Error, Result};
use crate::pack;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read one frame. Returns None on a clean close before the header.
pub async fn read_frame<S>(stream: &mut S, limit: u64) -> Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match stream.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as u64;
    if len == 0 {
        return Err(Error::InvalidRequest("zero-length document".to_string()));
    }
    if len > limit {
        return Err(Error::InvalidRequest(format!(
            "document of {} bytes exceeds the {} byte limit",
            len, limit
        )));
    }

    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one frame.
pub async fn write_frame<S>(stream: &mut S, payload: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let header = (payload.len() as u32).to_be_bytes();
    stream.write_all(&header).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

/// Receive and decode one document, or None on a clean close.
pub async fn recv_doc<S>(stream: &mut S, limit: u64) -> Result<Option<Node>>
where
    S: AsyncRead + Unpin,
{
    let Some(payload) = read_frame(stream, limit).await? else {
        return Ok(None);
    };
    let doc = pack::decode(&payload).map_err(Error::InvalidRequest)?;
    Ok(Some(doc))
}

/// Encode and send one document.
pub async fn send_doc<S>(stream: &mut S, doc: &Node, compress_level: u32) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let payload = pack::encode(doc, compress_level)?;
    write_frame(stream, &payload).await
}

/// Stream a stored pack file as a single frame.
pub async fn send_file<S>(stream: &mut S, path: &Path) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let payload = tokio::fs::read(path).await?;
    write_frame(stream, &payload).await
}
