//! Application hooks invoked by a connection.

use async_trait::async_trait;
use fetcp_wire::Protocol;
use std::sync::Arc;

use crate::connection::Connection;

/// Reactions to the events that occur on a connection.
///
/// Every hook runs inline in one of the connection's own tasks, so a hook that
/// never returns stalls that connection (and only that connection).
#[async_trait]
pub trait Callback<P: Protocol>: Send + Sync + 'static {
    /// Called once the connection has been accepted.
    ///
    /// Returning `false` rejects the connection; it is closed before any of
    /// its loops start.
    async fn on_connect(&self, conn: &Arc<Connection<P>>) -> bool;

    /// Called for every decoded packet, in arrival order.
    ///
    /// Returning `false` closes the connection.
    async fn on_message(&self, conn: &Arc<Connection<P>>, packet: P::Packet) -> bool;

    /// Called exactly once when the connection is torn down
    async fn on_close(&self, conn: &Arc<Connection<P>>);
}
