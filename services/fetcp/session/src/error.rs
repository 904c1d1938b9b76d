//! Session error types.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors returned by per-connection operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnError {
    /// The connection is closed or closing
    #[error("use of closed network connection")]
    Closing,

    /// The outbound queue is full and the caller would not wait long enough
    #[error("write packet was blocking")]
    WriteBlocking,
}

/// Errors returned by server operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// `serve` was already called on this server
    #[error("server already started")]
    AlreadyStarted,

    /// The server has been stopped
    #[error("server stopped")]
    Stopped,
}
