//! Newline-delimited JSON framing over any async byte stream.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{ProtocolError, MAX_FRAME_BYTES};

/// Read one frame and decode it.
///
/// Returns `Ok(None)` if the peer closed the stream before sending anything.
/// A final frame without a trailing newline is accepted.
pub async fn read_message<T, R>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = reader
        .take(MAX_FRAME_BYTES as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.len() >= MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge);
    }
    Ok(Some(serde_json::from_slice(&buf)?))
}

/// Encode `message`, append the delimiter, and write the frame in one call.
pub async fn write_message<T, W>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut frame = serde_json::to_vec(message)?;
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
