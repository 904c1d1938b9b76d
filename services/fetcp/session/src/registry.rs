//! Live connection registry.

use dashmap::DashMap;
use fetcp_wire::Protocol;
use std::sync::Arc;
use tracing::debug;

use crate::connection::{ConnId, Connection};

/// Thread-safe set of running connections keyed by [`ConnId`]
pub struct ConnectionRegistry<P: Protocol> {
    conns: DashMap<ConnId, Arc<Connection<P>>>,
}

impl<P: Protocol> ConnectionRegistry<P> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
        }
    }

    /// Register a connection; returns `false` if its id was already present
    pub fn add_conn(&self, conn: Arc<Connection<P>>) -> bool {
        let id = conn.id();
        let inserted = self.conns.insert(id, conn).is_none();
        debug!("Registered {} ({} live)", id, self.conns.len());
        inserted
    }

    /// Unregister a connection, returning it if it was present
    pub fn remove_conn(&self, id: ConnId) -> Option<Arc<Connection<P>>> {
        let removed = self.conns.remove(&id).map(|(_, conn)| conn);
        if removed.is_some() {
            debug!("Unregistered {} ({} live)", id, self.conns.len());
        }
        removed
    }

    /// Look up a connection
    pub fn get_conn(&self, id: ConnId) -> Option<Arc<Connection<P>>> {
        self.conns.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every registered connection
    pub fn list_conns(&self) -> Vec<Arc<Connection<P>>> {
        self.conns
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// Whether no connection is registered
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

impl<P: Protocol> Default for ConnectionRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
