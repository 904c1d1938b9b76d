//! TCP accept loop, connection registry, per-connection loops and graceful drain for fetcp.
//!
//! This crate is the lifecycle and concurrency engine of fetcp. A [`Server`]
//! accepts sockets and wraps each one in a [`Connection`] that runs four tasks
//! (read, write, dispatch, heartbeat) over bounded queues. Applications plug in
//! a [`Protocol`](fetcp_wire::Protocol) for decoding and a [`Callback`] for
//! handling events.
//!
//! ## Features
//!
//! - **Exactly-once teardown**: concurrent close triggers run the close path once
//! - **Backpressure**: fixed-capacity queues with non-blocking or timed enqueue
//! - **Heartbeat**: idle connections are closed after a keep-alive threshold
//! - **Fault isolation**: a panicking loop closes its own connection only
//! - **Graceful drain**: [`Server::stop`] returns once every task has finished
//!
//! ## Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use fetcp_session::{Callback, Connection, Server, ServerConfig};
//! use fetcp_wire::{Line, LineDelimited};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Callback<LineDelimited> for Echo {
//!     async fn on_connect(&self, _conn: &Arc<Connection<LineDelimited>>) -> bool {
//!         true
//!     }
//!
//!     async fn on_message(&self, conn: &Arc<Connection<LineDelimited>>, line: Line) -> bool {
//!         conn.write_packet(line, Duration::from_secs(1)).await.is_ok()
//!     }
//!
//!     async fn on_close(&self, conn: &Arc<Connection<LineDelimited>>) {
//!         println!("{} closed", conn.id());
//!     }
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = Server::new(Arc::new(Echo), LineDelimited::new(), ServerConfig::default());
//! let addr = server.serve().await?;
//! println!("listening on {}", addr);
//!
//! tokio::signal::ctrl_c().await?;
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod callback;
pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod server;
pub mod transport;

// Re-export main types
pub use callback::Callback;
pub use config::ServerConfig;
pub use connection::{ConnId, ConnState, ConnStats, Connection};
pub use error::{ConnError, ServerError};
pub use registry::ConnectionRegistry;
pub use server::Server;
pub use transport::{connect_tcp, listen_tcp};
