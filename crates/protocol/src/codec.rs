//! Frame codec: `tag:u8 ‖ length:u32be ‖ payload[length]`.
//!
//! Decoding reads one byte, then four, then exactly `length` bytes; a short
//! read mid-frame is a fatal connection error. Encoding assembles the whole
//! frame into one buffer and hands it to the transport as a single write,
//! so a decoder on the other end never observes a partial frame.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Upper bound on a single payload. Item lists are bounded by
/// `max_results`, so anything near this size is a corrupt or hostile
/// length word, not a real request.
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame payload length {0} exceeds {MAX_PAYLOAD_LEN} bytes")]
    PayloadTooLarge(u32),
    #[error("payload encode failed: {0}")]
    Encode(#[source] bincode::Error),
    #[error("payload decode failed: {0}")]
    Decode(#[source] bincode::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One decoded frame. `payload` is empty for standalone status tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub payload: Vec<u8>,
}

/// Read one frame. Returns `Ok(None)` on a clean end of stream (the peer
/// closed between frames); EOF inside a frame surfaces as an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut tag = [0u8; 1];
    if reader.read(&mut tag).await? == 0 {
        return Ok(None);
    }

    let len = reader.read_u32().await?;
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(len));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame {
        tag: tag[0],
        payload,
    }))
}

/// Write one frame as a single buffer. `payload` may be empty.
pub async fn write_frame<W>(writer: &mut W, tag: u8, payload: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(1 + 4 + payload.len());
    buf.push(tag);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(CodecError::Encode)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Decode)
}

/// Shared, write-serialized half of a connection.
///
/// Several tasks write to one client: the query dispatcher, async item
/// updates, and subscription pushes. The sink holds an async mutex for the
/// duration of exactly one frame write, which keeps frames atomic without
/// serializing anything beyond the write itself.
pub struct FrameSink {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl FrameSink {
    pub fn new<W>(writer: W) -> Arc<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Arc::new(Self {
            writer: Mutex::new(Box::new(writer)),
        })
    }

    /// Encode `value` and send it under `tag`.
    pub async fn send<T: Serialize>(&self, tag: u8, value: &T) -> Result<(), CodecError> {
        let payload = encode(value)?;
        self.send_raw(tag, &payload).await
    }

    /// Send a zero-payload status frame.
    pub async fn send_status(&self, tag: u8) -> Result<(), CodecError> {
        self.send_raw(tag, &[]).await
    }

    pub async fn send_raw(&self, tag: u8, payload: &[u8]) -> Result<(), CodecError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, tag, payload).await
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSink").finish_non_exhaustive()
    }
}
