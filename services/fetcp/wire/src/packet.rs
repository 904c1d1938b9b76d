//! The two capabilities the session engine is generic over.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncBufRead;

use crate::error::ProtocolError;

/// Buffered read side of a connection, as handed to [`Protocol::read_packet`]
pub type PacketReader<'a> = dyn AsyncBufRead + Unpin + Send + 'a;

/// One discrete application-level message
pub trait Packet: Send + 'static {
    /// Produce the wire bytes for this packet
    fn serialize(&self) -> Bytes;
}

/// Decoding strategy that turns a byte stream into packets
#[async_trait]
pub trait Protocol: Send + Sync + 'static {
    /// Packet type produced by this protocol
    type Packet: Packet;

    /// Decode exactly one packet from the reader.
    ///
    /// Return [`ProtocolError::Eof`] once the peer has closed the stream.
    async fn read_packet(&self, reader: &mut PacketReader<'_>)
        -> Result<Self::Packet, ProtocolError>;
}
