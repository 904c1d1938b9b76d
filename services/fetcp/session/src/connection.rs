//! Per-connection pipeline.
//!
//! Every accepted socket becomes a [`Connection`] running four tasks:
//!
//! - **read**: decodes packets with the server's protocol and queues them
//! - **dispatch**: hands queued packets to the application callback
//! - **write**: flushes packets queued through [`Connection::write_packet`]
//! - **heartbeat**: closes the connection once it has been idle too long
//!
//! All four stop on the connection's close signal, which is a child of the
//! server's shutdown signal, and all four funnel into [`Connection::close`].

use fetcp_wire::{Packet, Protocol};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ConnError;
use crate::server::ServerShared;

/// Read buffer size for the socket read half
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Stable connection identifier, unique per server
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of a connection
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnState {
    /// Accepted, loops not yet started
    Created = 0,
    /// Loops are running
    Running = 1,
    /// Teardown in progress
    Closing = 2,
    /// Teardown finished
    Closed = 3,
}

impl ConnState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnState::Created,
            1 => ConnState::Running,
            2 => ConnState::Closing,
            _ => ConnState::Closed,
        }
    }
}

/// Snapshot of a connection's counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnStats {
    /// Packets decoded from the socket
    pub packets_in: u64,
    /// Packets written to the socket
    pub packets_out: u64,
    /// Bytes written to the socket
    pub bytes_out: u64,
    /// Reads skipped because the protocol could not decode them
    pub decode_errors: u64,
    /// Writes that failed and were dropped
    pub write_errors: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    packets_in: AtomicU64,
    packets_out: AtomicU64,
    bytes_out: AtomicU64,
    decode_errors: AtomicU64,
    write_errors: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> ConnStats {
        ConnStats {
            packets_in: self.packets_in.load(Ordering::Relaxed),
            packets_out: self.packets_out.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Queue ends and socket half owned by the connection's loops
pub(crate) struct Pipes<P: Protocol> {
    reader: OwnedReadHalf,
    outbound_rx: mpsc::Receiver<P::Packet>,
    inbound_tx: mpsc::Sender<P::Packet>,
    inbound_rx: mpsc::Receiver<P::Packet>,
}

/// One accepted TCP connection and its processing pipeline
pub struct Connection<P: Protocol> {
    id: ConnId,
    peer_addr: SocketAddr,
    server: Arc<ServerShared<P>>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    extra: Mutex<Option<Arc<dyn Any + Send + Sync>>>,
    state: AtomicU8,
    close_token: CancellationToken,
    outbound_tx: mpsc::Sender<P::Packet>,
    heartbeat: AtomicBool,
    keep_alive_ms: AtomicU64,
    epoch: Instant,
    last_activity_ms: AtomicU64,
    stats: StatCounters,
}

impl<P: Protocol> Connection<P> {
    /// Wrap an accepted socket. Nothing runs until [`start`](Self::start).
    pub(crate) fn new(
        server: Arc<ServerShared<P>>,
        id: ConnId,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> (Arc<Self>, Pipes<P>) {
        let config = &server.config;
        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_queue_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.receive_queue_capacity);
        let (reader, writer) = stream.into_split();

        let conn = Arc::new(Self {
            id,
            peer_addr,
            writer: tokio::sync::Mutex::new(Some(writer)),
            extra: Mutex::new(None),
            state: AtomicU8::new(ConnState::Created as u8),
            close_token: server.shutdown.child_token(),
            outbound_tx,
            heartbeat: AtomicBool::new(config.heartbeat),
            keep_alive_ms: AtomicU64::new(config.keep_alive.as_millis() as u64),
            epoch: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            stats: StatCounters::default(),
            server,
        });

        let pipes = Pipes {
            reader,
            outbound_rx,
            inbound_tx,
            inbound_rx,
        };
        (conn, pipes)
    }

    /// Start the connection as a tracked task; a panic in the connect hook closes it
    pub(crate) fn launch(self: Arc<Self>, pipes: Pipes<P>) {
        self.spawn_guarded("start", Arc::clone(&self).start(pipes));
    }

    /// Run the connect hook, register with the server and spawn the loops
    async fn start(self: Arc<Self>, pipes: Pipes<P>) {
        let accepted = self.server.callback.on_connect(&self).await;
        if !accepted {
            info!("Connection {} from {} rejected by callback", self.id, self.peer_addr);
            self.close().await;
            return;
        }
        if self.server.shutdown.is_cancelled() {
            debug!("Server shutting down; dropping {} from {}", self.id, self.peer_addr);
            self.close().await;
            return;
        }

        self.server.registry.add_conn(Arc::clone(&self));
        if self.transition(ConnState::Created, ConnState::Running).is_err() {
            // Closed from inside on_connect
            self.server.registry.remove_conn(self.id);
            return;
        }

        let Pipes {
            reader,
            outbound_rx,
            inbound_tx,
            inbound_rx,
        } = pipes;

        self.spawn_guarded("heartbeat", Arc::clone(&self).heartbeat_loop());
        self.spawn_guarded("dispatch", Arc::clone(&self).dispatch_loop(inbound_rx));
        self.spawn_guarded("read", Arc::clone(&self).read_loop(reader, inbound_tx));
        self.spawn_guarded("write", Arc::clone(&self).write_loop(outbound_rx));
        info!("Connection {} from {} running", self.id, self.peer_addr);
    }

    /// Spawn a tracked loop whose panics close this connection only
    fn spawn_guarded<F>(self: &Arc<Self>, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let conn = Arc::clone(self);
        self.server.tracker.spawn(async move {
            if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                error!("{} task of {} panicked; closing connection", name, conn.id);
                conn.close().await;
            }
        });
    }

    /// Connection identifier
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Remote address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnState {
        ConnState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether teardown has begun
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) >= ConnState::Closing as u8
    }

    /// Signal fired when this connection closes or the server shuts down
    pub fn close_token(&self) -> CancellationToken {
        self.close_token.clone()
    }

    /// Signal fired when the owning server shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.server.shutdown.clone()
    }

    /// Counter snapshot
    pub fn stats(&self) -> ConnStats {
        self.stats.snapshot()
    }

    /// Enable or disable idle checking; takes effect at the next check
    pub fn set_heartbeat(&self, enabled: bool) {
        self.heartbeat.store(enabled, Ordering::Relaxed);
    }

    /// Whether idle checking is enabled
    pub fn heartbeat_enabled(&self) -> bool {
        self.heartbeat.load(Ordering::Relaxed)
    }

    /// Change the idle threshold for this connection
    pub fn set_keep_alive(&self, keep_alive: Duration) {
        self.keep_alive_ms
            .store(keep_alive.as_millis() as u64, Ordering::Relaxed);
    }

    /// Idle threshold for this connection
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms.load(Ordering::Relaxed))
    }

    /// Record successful activity now
    pub fn touch(&self) {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        // fetch_max keeps the timestamp from moving backwards when loops race
        self.last_activity_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    /// Time of the last successful read, write or dispatch
    pub fn last_activity(&self) -> Instant {
        self.epoch + Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed))
    }

    /// Time elapsed since the last recorded activity
    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }

    /// Attach application data, replacing any previous value
    pub fn put_extra<T: Any + Send + Sync>(&self, value: T) {
        *self.extra.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(value));
    }

    /// Application data, if present and of type `T`
    pub fn extra<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let slot = self.extra.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone().and_then(|value| value.downcast::<T>().ok())
    }

    /// Remove and return the application data
    pub fn take_extra(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.extra.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Queue a packet without waiting.
    ///
    /// Fails with [`ConnError::WriteBlocking`] when the outbound queue is full;
    /// the queue is left untouched in that case.
    pub fn try_write_packet(&self, packet: P::Packet) -> Result<(), ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closing);
        }
        match self.outbound_tx.try_send(packet) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ConnError::WriteBlocking),
            Err(TrySendError::Closed(_)) => Err(ConnError::Closing),
        }
    }

    /// Queue a packet for the write loop.
    ///
    /// A zero `timeout` never waits. Otherwise waits up to `timeout` for queue
    /// space, returning early with [`ConnError::Closing`] if the connection
    /// closes meanwhile.
    pub async fn write_packet(&self, packet: P::Packet, timeout: Duration) -> Result<(), ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closing);
        }
        if timeout.is_zero() {
            return self.try_write_packet(packet);
        }

        tokio::select! {
            biased;

            _ = self.close_token.cancelled() => Err(ConnError::Closing),

            sent = tokio::time::timeout(timeout, self.outbound_tx.send(packet)) => match sent {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(ConnError::Closing),
                Err(_) => Err(ConnError::WriteBlocking),
            },
        }
    }

    /// Close the connection.
    ///
    /// The first caller tears everything down and runs the close hook; every
    /// other caller returns immediately.
    pub async fn close(self: &Arc<Self>) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= ConnState::Closing as u8 {
                return;
            }
            match self.state.compare_exchange(
                current,
                ConnState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        self.heartbeat.store(false, Ordering::Relaxed);
        self.close_token.cancel();

        // The write loop drops the lock as soon as it sees the close signal
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Socket shutdown for {} failed: {}", self.id, e);
            }
        }

        self.server.registry.remove_conn(self.id);
        let hook = AssertUnwindSafe(self.server.callback.on_close(self));
        if hook.catch_unwind().await.is_err() {
            error!("Close hook of {} panicked", self.id);
        }
        self.state.store(ConnState::Closed as u8, Ordering::Release);

        info!(
            "Connection {} from {} closed. Stats: {:?}",
            self.id,
            self.peer_addr,
            self.stats.snapshot()
        );
    }

    fn transition(&self, from: ConnState, to: ConnState) -> Result<(), ConnState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ConnState::from_u8)
    }

    async fn read_loop(self: Arc<Self>, reader: OwnedReadHalf, inbound_tx: mpsc::Sender<P::Packet>) {
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
        let protocol = Arc::clone(&self.server.protocol);

        loop {
            let result = tokio::select! {
                biased;
                _ = self.close_token.cancelled() => break,
                result = protocol.read_packet(&mut reader) => result,
            };

            let packet = match result {
                Ok(packet) => packet,
                Err(e) if e.is_terminal() => {
                    debug!("Read side of {} finished: {}", self.id, e);
                    break;
                }
                Err(e) => {
                    self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    debug!("Skipping unreadable packet from {}: {}", self.peer_addr, e);
                    continue;
                }
            };

            self.touch();
            self.stats.packets_in.fetch_add(1, Ordering::Relaxed);

            match inbound_tx.try_send(packet) {
                Ok(()) => {}
                Err(TrySendError::Full(packet)) => {
                    // Stop reading until the dispatcher catches up; TCP pushes back on the peer
                    warn!("Inbound queue of {} is full; pausing reads", self.id);
                    let sent = tokio::select! {
                        biased;
                        _ = self.close_token.cancelled() => break,
                        sent = inbound_tx.send(packet) => sent,
                    };
                    if sent.is_err() {
                        break;
                    }
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }

        self.close().await;
    }

    async fn write_loop(self: Arc<Self>, mut outbound_rx: mpsc::Receiver<P::Packet>) {
        loop {
            let packet = tokio::select! {
                biased;
                _ = self.close_token.cancelled() => break,
                packet = outbound_rx.recv() => match packet {
                    Some(packet) => packet,
                    None => break,
                },
            };
            if self.is_closed() {
                break;
            }

            let bytes = packet.serialize();
            let written = tokio::select! {
                biased;
                _ = self.close_token.cancelled() => break,
                written = self.write_bytes(&bytes) => written,
            };

            match written {
                Ok(()) => {
                    self.touch();
                    self.stats.packets_out.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .bytes_out
                        .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                }
                Err(e) => {
                    // Best effort: drop the packet and keep the connection alive
                    self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Failed to write {} bytes to {}: {}", bytes.len(), self.peer_addr, e);
                }
            }
        }

        outbound_rx.close();
        let mut dropped = 0usize;
        while outbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} unsent packets for {}", dropped, self.id);
        }

        self.close().await;
    }

    async fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => writer.write_all(bytes).await,
            None => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    async fn dispatch_loop(self: Arc<Self>, mut inbound_rx: mpsc::Receiver<P::Packet>) {
        let callback = Arc::clone(&self.server.callback);

        loop {
            let packet = tokio::select! {
                biased;
                _ = self.close_token.cancelled() => break,
                packet = inbound_rx.recv() => match packet {
                    Some(packet) => packet,
                    None => break,
                },
            };
            if self.is_closed() {
                break;
            }

            if !callback.on_message(&self, packet).await {
                debug!("Callback asked to close {}", self.id);
                break;
            }
            self.touch();
        }

        inbound_rx.close();
        let mut dropped = 0usize;
        while inbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} undispatched packets for {}", dropped, self.id);
        }

        self.close().await;
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        if !self.heartbeat_enabled() {
            return;
        }

        let period = self.server.config.heartbeat_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.close_token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if !self.heartbeat_enabled() {
                debug!("Heartbeat disabled for {}", self.id);
                return;
            }

            let idle = self.idle_for();
            if idle >= self.keep_alive() {
                warn!(
                    "Idle timeout reached for {} ({:?} without activity); closing connection",
                    self.peer_addr, idle
                );
                self.close().await;
                return;
            }
        }
    }
}

impl<P: Protocol> fmt::Debug for Connection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Callback;
    use crate::config::ServerConfig;
    use async_trait::async_trait;
    use fetcp_wire::{Frame, LengthPrefixed};
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct CountingCallback {
        closes: AtomicUsize,
    }

    #[async_trait]
    impl Callback<LengthPrefixed> for CountingCallback {
        async fn on_connect(&self, _conn: &Arc<Connection<LengthPrefixed>>) -> bool {
            true
        }

        async fn on_message(&self, _conn: &Arc<Connection<LengthPrefixed>>, _packet: Frame) -> bool {
            true
        }

        async fn on_close(&self, _conn: &Arc<Connection<LengthPrefixed>>) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Build a connection over a loopback socket without starting its loops
    async fn idle_connection(
        config: ServerConfig,
    ) -> (Arc<Connection<LengthPrefixed>>, Pipes<LengthPrefixed>, Arc<CountingCallback>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, peer) = listener.accept().await.unwrap();

        let callback = Arc::new(CountingCallback::default());
        let shared = Arc::new(ServerShared::new(
            callback.clone(),
            LengthPrefixed::new(),
            config,
        ));
        let (conn, pipes) = Connection::new(shared, ConnId(1), server_side, peer);
        (conn, pipes, callback, client)
    }

    #[tokio::test]
    async fn test_try_write_on_full_queue() {
        let config = ServerConfig::default().with_send_queue_capacity(1);
        let (conn, mut pipes, _callback, _client) = idle_connection(config).await;

        assert_eq!(conn.try_write_packet(Frame::new(&b"A"[..])), Ok(()));
        assert_eq!(
            conn.try_write_packet(Frame::new(&b"B"[..])),
            Err(ConnError::WriteBlocking)
        );

        // Queue still holds only A
        let queued = pipes.outbound_rx.try_recv().unwrap();
        assert_eq!(&queued.payload[..], b"A");
        assert!(pipes.outbound_rx.try_recv().is_err());

        assert_eq!(conn.try_write_packet(Frame::new(&b"B"[..])), Ok(()));
    }

    #[tokio::test]
    async fn test_write_packet_times_out_on_full_queue() {
        let config = ServerConfig::default().with_send_queue_capacity(1);
        let (conn, _pipes, _callback, _client) = idle_connection(config).await;

        conn.try_write_packet(Frame::new(&b"A"[..])).unwrap();
        let started = Instant::now();
        let result = conn
            .write_packet(Frame::new(&b"B"[..]), Duration::from_millis(50))
            .await;
        assert_eq!(result, Err(ConnError::WriteBlocking));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_blocked_write_returns_closing_when_connection_closes() {
        let config = ServerConfig::default().with_send_queue_capacity(1);
        let (conn, _pipes, _callback, _client) = idle_connection(config).await;
        conn.try_write_packet(Frame::new(&b"A"[..])).unwrap();

        let writer = Arc::clone(&conn);
        let pending = tokio::spawn(async move {
            writer
                .write_packet(Frame::new(&b"B"[..]), Duration::from_secs(30))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        conn.close().await;

        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(ConnError::Closing));
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_writes() {
        let (conn, _pipes, _callback, _client) = idle_connection(ServerConfig::default()).await;
        conn.close().await;

        assert_eq!(
            conn.try_write_packet(Frame::new(&b"x"[..])),
            Err(ConnError::Closing)
        );
        assert_eq!(
            conn.write_packet(Frame::new(&b"x"[..]), Duration::ZERO).await,
            Err(ConnError::Closing)
        );
        assert_eq!(
            conn.write_packet(Frame::new(&b"x"[..]), Duration::from_secs(1)).await,
            Err(ConnError::Closing)
        );
    }

    #[tokio::test]
    async fn test_concurrent_close_runs_teardown_once() {
        let (conn, _pipes, callback, _client) = idle_connection(ServerConfig::default()).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let conn = Arc::clone(&conn);
            handles.push(tokio::spawn(async move { conn.close().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(callback.closes.load(Ordering::SeqCst), 1);
        assert_eq!(conn.state(), ConnState::Closed);
        assert!(conn.is_closed());
        assert!(conn.close_token().is_cancelled());
        assert!(!conn.heartbeat_enabled());
    }

    #[tokio::test]
    async fn test_close_shuts_down_socket() {
        use tokio::io::AsyncReadExt;

        let (conn, _pipes, _callback, mut client) = idle_connection(ServerConfig::default()).await;
        conn.close().await;

        let mut buf = [0u8; 8];
        let read = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn test_activity_timestamp_is_monotonic() {
        let (conn, _pipes, _callback, _client) = idle_connection(ServerConfig::default()).await;

        let before = conn.last_activity();
        tokio::time::sleep(Duration::from_millis(10)).await;
        conn.touch();
        let after = conn.last_activity();
        assert!(after >= before);
        assert!(conn.idle_for() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_extra_slot() {
        let (conn, _pipes, _callback, _client) = idle_connection(ServerConfig::default()).await;

        assert!(conn.extra::<String>().is_none());
        conn.put_extra("player-7".to_string());
        assert_eq!(conn.extra::<String>().as_deref().map(String::as_str), Some("player-7"));
        assert!(conn.extra::<u32>().is_none());

        assert!(conn.take_extra().is_some());
        assert!(conn.extra::<String>().is_none());
    }

    #[tokio::test]
    async fn test_heartbeat_and_keep_alive_setters() {
        let config = ServerConfig::default()
            .with_heartbeat(true)
            .with_keep_alive(Duration::from_secs(10));
        let (conn, _pipes, _callback, _client) = idle_connection(config).await;

        assert!(conn.heartbeat_enabled());
        assert_eq!(conn.keep_alive(), Duration::from_secs(10));

        conn.set_heartbeat(false);
        conn.set_keep_alive(Duration::from_millis(1500));
        assert!(!conn.heartbeat_enabled());
        assert_eq!(conn.keep_alive(), Duration::from_millis(1500));
        assert_eq!(conn.state(), ConnState::Created);
        assert_eq!(conn.id().to_string(), "conn-1");
    }
}
