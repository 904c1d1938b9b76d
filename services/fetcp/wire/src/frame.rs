//! Length-prefixed framing.
//!
//! Each frame is a `u32` big-endian payload length followed by the payload.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

use crate::error::ProtocolError;
use crate::packet::{Packet, PacketReader, Protocol};

/// Maximum frame payload size (16 MiB default)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

/// A single length-prefixed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame from a payload
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Get the total frame size when encoded
    pub fn encoded_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }
}

impl Packet for Frame {
    fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// Protocol decoding [`Frame`]s
#[derive(Debug, Clone)]
pub struct LengthPrefixed {
    max_frame_size: usize,
}

impl LengthPrefixed {
    /// Create a decoder with the default size limit
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a decoder with a custom size limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Configured payload limit
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for LengthPrefixed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Protocol for LengthPrefixed {
    type Packet = Frame;

    async fn read_packet(&self, reader: &mut PacketReader<'_>) -> Result<Frame, ProtocolError> {
        let frame_len = reader.read_u32().await? as usize;

        if frame_len > self.max_frame_size {
            // Skip the oversized payload so the next read starts on a frame boundary
            let skipped = tokio::io::copy(&mut (&mut *reader).take(frame_len as u64), &mut tokio::io::sink()).await?;
            if skipped < frame_len as u64 {
                return Err(ProtocolError::Eof);
            }
            debug!("Discarded oversized frame of {} bytes", frame_len);
            return Err(ProtocolError::FrameTooLarge {
                size: frame_len,
                max: self.max_frame_size,
            });
        }

        let mut payload = BytesMut::zeroed(frame_len);
        reader.read_exact(&mut payload).await?;
        trace!("Decoded frame with {} byte payload", frame_len);

        Ok(Frame {
            payload: payload.freeze(),
        })
    }
}
