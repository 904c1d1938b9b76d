//! Newline-delimited text lines.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::ProtocolError;
use crate::packet::{Packet, PacketReader, Protocol};

/// Maximum line length in bytes, terminator excluded (64 KiB default)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// A single line of text without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line(pub String);

impl Line {
    /// Create a line from text
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Line contents
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Packet for Line {
    fn serialize(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        out.extend_from_slice(self.0.as_bytes());
        out.push(b'\n');
        Bytes::from(out)
    }
}

/// Protocol decoding [`Line`]s
#[derive(Debug, Clone)]
pub struct LineDelimited {
    max_line_length: usize,
}

impl LineDelimited {
    /// Create a decoder with the default length limit
    pub fn new() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Create a decoder with a custom length limit
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self { max_line_length }
    }
}

impl Default for LineDelimited {
    fn default() -> Self {
        Self::new()
    }
}

/// Consume input up to and including the next `\n`
async fn skip_line(reader: &mut PacketReader<'_>) -> Result<(), ProtocolError> {
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = available.len();
        reader.consume(len);
    }
}

#[async_trait]
impl Protocol for LineDelimited {
    type Packet = Line;

    async fn read_packet(&self, reader: &mut PacketReader<'_>) -> Result<Line, ProtocolError> {
        let mut buf = Vec::new();
        // One byte past the limit for the terminator
        let limit = self.max_line_length as u64 + 1;
        let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if read == 0 {
            return Err(ProtocolError::Eof);
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
        } else if buf.len() > self.max_line_length {
            skip_line(reader).await?;
            debug!("Discarded line longer than {} bytes", self.max_line_length);
            return Err(ProtocolError::FrameTooLarge {
                size: buf.len(),
                max: self.max_line_length,
            });
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        String::from_utf8(buf)
            .map(Line)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_decode_lines() {
        let wire = b"hello\r\nworld\nlast";
        let mut reader = BufReader::new(&wire[..]);
        let protocol = LineDelimited::new();

        assert_eq!(protocol.read_packet(&mut reader).await.unwrap().as_str(), "hello");
        assert_eq!(protocol.read_packet(&mut reader).await.unwrap().as_str(), "world");
        assert_eq!(protocol.read_packet(&mut reader).await.unwrap().as_str(), "last");
        assert!(matches!(
            protocol.read_packet(&mut reader).await,
            Err(ProtocolError::Eof)
        ));
    }

    #[tokio::test]
    async fn test_overlong_line_is_skipped() {
        let wire = b"0123456789abcdef\nshort\n";
        let mut reader = BufReader::new(&wire[..]);
        let protocol = LineDelimited::with_max_line_length(8);

        assert!(matches!(
            protocol.read_packet(&mut reader).await,
            Err(ProtocolError::FrameTooLarge { max: 8, .. })
        ));
        assert_eq!(protocol.read_packet(&mut reader).await.unwrap().as_str(), "short");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_malformed_and_recoverable() {
        let wire = b"\xff\xfe\nfine\n";
        let mut reader = BufReader::new(&wire[..]);
        let protocol = LineDelimited::new();

        let bad = protocol.read_packet(&mut reader).await;
        assert!(matches!(bad, Err(ProtocolError::Malformed(_))));
        assert!(!bad.unwrap_err().is_terminal());
        assert_eq!(protocol.read_packet(&mut reader).await.unwrap().as_str(), "fine");
    }

    #[test]
    fn test_line_serialize_appends_newline() {
        assert_eq!(&Line::new("ping").serialize()[..], b"ping\n");
    }
}
