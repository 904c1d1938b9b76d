//! Protocol decoding error types.

use std::io;
use thiserror::Error;

/// Errors a [`Protocol`](crate::Protocol) reports while decoding a packet
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The peer closed the stream
    #[error("end of stream")]
    Eof,

    /// Underlying socket error
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Announced frame exceeds the configured limit
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Announced size
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Bytes could not be turned into a packet
    #[error("malformed packet: {0}")]
    Malformed(String),
}

impl ProtocolError {
    /// Whether the stream cannot produce any further packets.
    ///
    /// A clean end of stream is terminal, and so are socket errors saying the
    /// peer is gone. Everything else is a single bad read the caller may skip.
    pub fn is_terminal(&self) -> bool {
        match self {
            ProtocolError::Eof => true,
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ),
            ProtocolError::FrameTooLarge { .. } | ProtocolError::Malformed(_) => false,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ProtocolError::Eof
        } else {
            ProtocolError::Io(e)
        }
    }
}
