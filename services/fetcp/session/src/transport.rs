//! Socket setup for the server side and for clients.

use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::error::ServerError;

/// Bind a listener and report the address it actually got.
///
/// Any failure, including reading back the local address, is a
/// [`ServerError::Bind`] for `addr`.
pub async fn listen_tcp(addr: SocketAddr) -> Result<(TcpListener, SocketAddr), ServerError> {
    let bind = async {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok::<_, io::Error>((listener, local_addr))
    };
    bind.await.map_err(|source| ServerError::Bind { addr, source })
}

/// Connect to a fetcp server with Nagle disabled
pub async fn connect_tcp(addr: SocketAddr) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Socket options for an accepted stream. Failures only cost latency.
pub(crate) fn tune_accepted(stream: &TcpStream, peer_addr: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
    }
}
