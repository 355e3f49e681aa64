//! Length-prefixed frame codec
//!
//! TCP has no message boundaries: one `read` may return several frames, or
//! only part of one. The codec buffers bytes until a whole frame is present
//! and only then hands the payload out.
//!
//! The declared length is checked against the configured maximum as soon as
//! the header arrives, so an oversized frame is rejected before any of its
//! payload is buffered.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FramingError, Result};
use crate::protocol::constants::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_LEN};

/// Stateless frame encoder/decoder bounded by a maximum payload size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec accepting payloads up to `max_frame_size` bytes
    ///
    /// The limit is capped at `u32::MAX`, the largest length the header can carry.
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(u32::MAX as usize),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Append one frame carrying `payload` to `dst`
    pub fn encode(&self, payload: &[u8], dst: &mut BytesMut) -> std::result::Result<(), FramingError> {
        if payload.len() > self.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                length: payload.len(),
                max: self.max_frame_size,
            });
        }

        dst.reserve(FRAME_HEADER_LEN + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(payload);
        Ok(())
    }

    /// Encode `payload` into a standalone frame
    pub fn encode_to_bytes(&self, payload: &[u8]) -> std::result::Result<Bytes, FramingError> {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        self.encode(payload, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Take one complete frame off the front of `src`
    ///
    /// Returns `Ok(None)` when more bytes are needed. Consumed bytes are
    /// removed from `src`; an incomplete frame is left untouched.
    pub fn decode(&self, src: &mut BytesMut) -> std::result::Result<Option<Bytes>, FramingError> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if length > self.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                length,
                max: self.max_frame_size,
            });
        }

        let total = FRAME_HEADER_LEN + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        Ok(Some(src.split_to(length).freeze()))
    }

    /// Describe the partial frame left in `src` when the stream ended
    pub fn truncated(&self, src: &BytesMut) -> FramingError {
        if src.len() < FRAME_HEADER_LEN {
            return FramingError::Truncated {
                expected: FRAME_HEADER_LEN,
                received: src.len(),
            };
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        FramingError::Truncated {
            expected: length,
            received: src.len() - FRAME_HEADER_LEN,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

/// Buffered frame reader over any async byte stream
///
/// `read_frame` is cancel-safe: if its future is dropped (for example as the
/// losing branch of a `select!`), bytes already read stay in the buffer and
/// the next call picks up where the last one stopped.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buf: BytesMut,
    codec: FrameCodec,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, codec: FrameCodec) -> Self {
        Self::with_capacity(reader, codec, 8 * 1024)
    }

    pub fn with_capacity(reader: R, codec: FrameCodec, capacity: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(capacity),
            codec,
        }
    }

    /// Read the next frame payload
    ///
    /// `Ok(None)` means the peer closed the stream cleanly on a frame boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(payload) = self.codec.decode(&mut self.buf)? {
                return Ok(Some(payload));
            }

            if self.reader.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(self.codec.truncated(&self.buf).into());
            }
        }
    }

    /// Bytes buffered but not yet returned as a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Write `payload` as one frame and flush
pub async fn write_frame<W>(writer: &mut W, codec: &FrameCodec, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = codec.encode_to_bytes(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
