//! Packet and protocol capabilities plus reference codecs for fetcp.
//!
//! The session engine never looks at bytes itself. It asks a [`Protocol`] to
//! decode the next packet from the socket and asks each outbound [`Packet`] to
//! serialize itself. This crate defines both capabilities and ships two small
//! codecs that are good enough for demos, tests and simple services.
//!
//! ## Codecs
//!
//! - **Length prefixed**: `u32` big-endian length followed by the payload
//! - **Line delimited**: UTF-8 text terminated by `\n` (`\r\n` accepted)
//!
//! ## Wire Format (length prefixed)
//!
//! ```text
//! +----------------------+----------------------------+
//! | u32 frame_len        | length of bytes that follow|
//! +----------------------+----------------------------+
//! | payload              | variable (0..max)          |
//! +----------------------+----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod frame;
pub mod line;
pub mod packet;

// Re-export main types
pub use error::ProtocolError;
pub use frame::{Frame, LengthPrefixed, DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};
pub use line::{Line, LineDelimited, DEFAULT_MAX_LINE_LENGTH};
pub use packet::{Packet, PacketReader, Protocol};
