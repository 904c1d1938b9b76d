//! Accept loop, connection registry and graceful shutdown.

use fetcp_wire::Protocol;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::callback::Callback;
use crate::config::ServerConfig;
use crate::connection::{ConnId, Connection};
use crate::error::ServerError;
use crate::registry::ConnectionRegistry;
use crate::transport::{listen_tcp, tune_accepted};

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion) does not spin
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// State shared between the server handle, the accept loop and every connection
pub(crate) struct ServerShared<P: Protocol> {
    pub(crate) config: ServerConfig,
    pub(crate) callback: Arc<dyn Callback<P>>,
    pub(crate) protocol: Arc<P>,
    pub(crate) registry: ConnectionRegistry<P>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) tracker: TaskTracker,
    next_conn_id: AtomicU64,
    started: AtomicBool,
    /// Held by `serve` from bind to accept-loop spawn; `stop` waits on it before draining
    lifecycle: Mutex<()>,
    local_addr: OnceLock<SocketAddr>,
}

impl<P: Protocol> ServerShared<P> {
    pub(crate) fn new(callback: Arc<dyn Callback<P>>, protocol: P, config: ServerConfig) -> Self {
        Self {
            config: config.sanitized(),
            callback,
            protocol: Arc::new(protocol),
            registry: ConnectionRegistry::new(),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            next_conn_id: AtomicU64::new(1),
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            local_addr: OnceLock::new(),
        }
    }

    fn next_conn_id(&self) -> ConnId {
        ConnId(self.next_conn_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// TCP server handle.
///
/// Cheap to clone; every clone drives the same listener and registry.
pub struct Server<P: Protocol> {
    shared: Arc<ServerShared<P>>,
}

impl<P: Protocol> Clone for Server<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Protocol> Server<P> {
    /// Create a server. No socket is touched until [`serve`](Self::serve).
    pub fn new<C: Callback<P>>(callback: Arc<C>, protocol: P, config: ServerConfig) -> Self {
        Self {
            shared: Arc::new(ServerShared::new(callback, protocol, config)),
        }
    }

    /// Bind the listener and start accepting in the background.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// the configured port is 0.
    pub async fn serve(&self) -> Result<SocketAddr, ServerError> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        if self.shared.shutdown.is_cancelled() {
            return Err(ServerError::Stopped);
        }
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(ServerError::AlreadyStarted);
        }

        let (listener, local_addr) = match listen_tcp(self.shared.config.listen_addr()).await {
            Ok(bound) => bound,
            Err(e) => {
                self.shared.started.store(false, Ordering::Release);
                return Err(e);
            }
        };

        if self.shared.shutdown.is_cancelled() {
            debug!("Server {} stopped while binding; releasing {}", self.shared.config.name, local_addr);
            return Err(ServerError::Stopped);
        }

        let _ = self.shared.local_addr.set(local_addr);
        info!("Server {} listening on {}", self.shared.config.name, local_addr);

        self.shared
            .tracker
            .spawn(accept_loop(Arc::clone(&self.shared), listener));
        Ok(local_addr)
    }

    /// Stop accepting, close every connection and wait for all tasks to finish.
    ///
    /// Safe to call more than once and from several tasks; every call returns
    /// only once the server is fully drained.
    pub async fn stop(&self) {
        let first = !self.shared.shutdown.is_cancelled();
        self.shared.shutdown.cancel();
        if first {
            info!(
                "Stopping server {} ({} live connections)",
                self.shared.config.name,
                self.shared.registry.len()
            );
        }

        // A serve() already past its shutdown check finishes spawning first
        drop(self.shared.lifecycle.lock().await);

        for conn in self.shared.registry.list_conns() {
            conn.close().await;
        }

        self.shared.tracker.close();
        self.shared.tracker.wait().await;

        if first {
            info!("Server {} stopped", self.shared.config.name);
        }
    }

    /// Whether [`stop`](Self::stop) has been called
    pub fn is_stopped(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Signal fired when the server begins shutting down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    /// Configuration in effect
    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    /// Bound listener address, once [`serve`](Self::serve) succeeded
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.local_addr.get().copied()
    }

    /// Register a connection
    pub fn add_conn(&self, conn: Arc<Connection<P>>) -> bool {
        self.shared.registry.add_conn(conn)
    }

    /// Unregister a connection
    pub fn remove_conn(&self, id: ConnId) -> Option<Arc<Connection<P>>> {
        self.shared.registry.remove_conn(id)
    }

    /// Look up a live connection
    pub fn get_conn(&self, id: ConnId) -> Option<Arc<Connection<P>>> {
        self.shared.registry.get_conn(id)
    }

    /// Snapshot of every live connection
    pub fn list_conns(&self) -> Vec<Arc<Connection<P>>> {
        self.shared.registry.list_conns()
    }

    /// Number of live connections
    pub fn conn_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Number of tasks (accept loop and connection loops) still running
    pub fn task_count(&self) -> usize {
        self.shared.tracker.len()
    }
}

async fn accept_loop<P: Protocol>(shared: Arc<ServerShared<P>>, listener: TcpListener) {
    let poll = shared.config.accept_poll_interval;

    loop {
        let accepted = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            accepted = tokio::time::timeout(poll, listener.accept()) => accepted,
        };

        let (stream, peer_addr) = match accepted {
            // Poll window elapsed; go round and look at the shutdown signal again
            Err(_) => continue,
            Ok(Err(e)) => {
                warn!("Accept error on {}: {}", shared.config.name, e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                continue;
            }
            Ok(Ok(accepted)) => accepted,
        };

        tune_accepted(&stream, peer_addr);

        let id = shared.next_conn_id();
        debug!("Accepted {} from {}", id, peer_addr);
        let (conn, pipes) = Connection::new(Arc::clone(&shared), id, stream, peer_addr);
        conn.launch(pipes);
    }

    info!("Accept loop of {} stopped", shared.config.name);
}
