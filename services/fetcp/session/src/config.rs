//! Server configuration.
//!
//! A [`ServerConfig`] is built once, handed to [`Server::new`](crate::Server::new)
//! and never mutated afterwards.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Configuration for a fetcp server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Label used in log lines
    pub name: String,
    /// Interface to listen on
    pub listen_ip: IpAddr,
    /// TCP port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Capacity of each connection's outbound packet queue
    pub send_queue_capacity: usize,
    /// Capacity of each connection's inbound packet queue
    pub receive_queue_capacity: usize,
    /// Idle time after which a connection is considered dead
    pub keep_alive: Duration,
    /// Whether new connections start with heartbeat checking enabled
    pub heartbeat: bool,
    /// Interval between heartbeat checks
    pub heartbeat_interval: Duration,
    /// Upper bound on a single accept wait
    pub accept_poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "fetcp".to_string(),
            listen_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 9000,
            send_queue_capacity: 4096,
            receive_queue_capacity: 4096,
            keep_alive: Duration::from_secs(300),
            heartbeat: false,
            heartbeat_interval: Duration::from_secs(5),
            accept_poll_interval: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    /// Set the server label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the listen interface
    pub fn with_listen_ip(mut self, ip: IpAddr) -> Self {
        self.listen_ip = ip;
        self
    }

    /// Set the listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the outbound queue capacity (minimum 1)
    pub fn with_send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity.max(1);
        self
    }

    /// Set the inbound queue capacity (minimum 1)
    pub fn with_receive_queue_capacity(mut self, capacity: usize) -> Self {
        self.receive_queue_capacity = capacity.max(1);
        self
    }

    /// Set the keep-alive threshold
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Enable or disable heartbeat checking for new connections
    pub fn with_heartbeat(mut self, enabled: bool) -> Self {
        self.heartbeat = enabled;
        self
    }

    /// Set the heartbeat check interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the accept poll interval
    pub fn with_accept_poll_interval(mut self, interval: Duration) -> Self {
        self.accept_poll_interval = interval;
        self
    }

    /// Address the listener binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_ip, self.port)
    }

    // tokio channels and intervals panic on zero
    pub(crate) fn sanitized(mut self) -> Self {
        self.send_queue_capacity = self.send_queue_capacity.max(1);
        self.receive_queue_capacity = self.receive_queue_capacity.max(1);
        if self.heartbeat_interval.is_zero() {
            self.heartbeat_interval = Duration::from_millis(1);
        }
        if self.accept_poll_interval.is_zero() {
            self.accept_poll_interval = Duration::from_millis(1);
        }
        self
    }
}
