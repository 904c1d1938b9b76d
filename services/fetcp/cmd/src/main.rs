//! fetcp echo server.
//!
//! Runs the connection engine with an echo callback over either newline
//! delimited text or length-prefixed frames, until Ctrl-C.

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use fetcp_session::{Callback, ConnError, Connection, Server, ServerConfig};
use fetcp_wire::{Frame, LengthPrefixed, Line, LineDelimited, Protocol};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[macro_use]
mod logging;
mod config;

use config::FileConfig;
use logging::FetcpLogFormatter;

/// How long an echo may wait for room in the outbound queue
const ECHO_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Codec {
    /// Newline-delimited UTF-8 text
    Line,
    /// u32 big-endian length prefix followed by the payload
    Frame,
}

/// TCP echo server built on the fetcp connection engine
#[derive(Parser, Debug)]
#[command(name = "fetcp", version, about = "TCP echo server on the fetcp connection engine")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "fetcp.yaml")]
    config: PathBuf,

    /// Listen port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Close connections that stay idle longer than the keep-alive
    #[arg(long)]
    heartbeat: bool,

    /// Idle threshold, e.g. 30s (overrides the config file)
    #[arg(long)]
    keep_alive: Option<humantime::Duration>,

    /// Wire format
    #[arg(long, value_enum, default_value = "line")]
    codec: Codec,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Writes every packet back to its sender
struct Echo;

impl Echo {
    /// Keep the connection unless it is already going away
    fn echoed(conn_id: impl std::fmt::Display, result: Result<(), ConnError>) -> bool {
        match result {
            Ok(()) => true,
            Err(ConnError::WriteBlocking) => {
                component_warn!("echo", "Outbound queue of {} full; echo dropped", conn_id);
                true
            }
            Err(ConnError::Closing) => false,
        }
    }
}

#[async_trait]
impl Callback<LineDelimited> for Echo {
    async fn on_connect(&self, conn: &Arc<Connection<LineDelimited>>) -> bool {
        component_info!("echo", "{} connected from {}", conn.id(), conn.peer_addr());
        true
    }

    async fn on_message(&self, conn: &Arc<Connection<LineDelimited>>, line: Line) -> bool {
        if line.as_str().trim() == "quit" {
            component_info!("echo", "{} asked to quit", conn.id());
            return false;
        }
        Self::echoed(conn.id(), conn.write_packet(line, ECHO_WRITE_TIMEOUT).await)
    }

    async fn on_close(&self, conn: &Arc<Connection<LineDelimited>>) {
        component_info!("echo", "{} disconnected. Stats: {:?}", conn.id(), conn.stats());
    }
}

#[async_trait]
impl Callback<LengthPrefixed> for Echo {
    async fn on_connect(&self, conn: &Arc<Connection<LengthPrefixed>>) -> bool {
        component_info!("echo", "{} connected from {}", conn.id(), conn.peer_addr());
        true
    }

    async fn on_message(&self, conn: &Arc<Connection<LengthPrefixed>>, frame: Frame) -> bool {
        component_debug!("echo", "{} sent {} bytes", conn.id(), frame.payload.len());
        Self::echoed(conn.id(), conn.write_packet(frame, ECHO_WRITE_TIMEOUT).await)
    }

    async fn on_close(&self, conn: &Arc<Connection<LengthPrefixed>>) {
        component_info!("echo", "{} disconnected. Stats: {:?}", conn.id(), conn.stats());
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("fetcp={}", args.log_level).parse()?)
        .add_directive(format!("fetcp_session={}", args.log_level).parse()?)
        .add_directive(format!("fetcp_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(true)
        .event_format(FetcpLogFormatter::new("fetcp"))
        .init();

    component_info!("main", "Starting fetcp v{}", env!("CARGO_PKG_VERSION"));

    let mut config = FileConfig::load_from_file(&args.config)?.into_server_config();
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if args.heartbeat {
        config = config.with_heartbeat(true);
    }
    if let Some(keep_alive) = args.keep_alive {
        config = config.with_keep_alive(keep_alive.into());
    }

    let result = match args.codec {
        Codec::Line => run(LineDelimited::new(), config).await,
        Codec::Frame => run(LengthPrefixed::new(), config).await,
    };
    if let Err(e) = &result {
        component_error!("main", "fetcp exited with error: {:#}", e);
    }
    result
}

async fn run<P>(protocol: P, config: ServerConfig) -> anyhow::Result<()>
where
    P: Protocol,
    Echo: Callback<P>,
{
    let server = Server::new(Arc::new(Echo), protocol, config);
    let addr = server.serve().await?;
    component_info!(
        "main",
        "Listening on {} (heartbeat={}, keep_alive={:?})",
        addr,
        server.config().heartbeat,
        server.config().keep_alive
    );

    tokio::signal::ctrl_c().await?;
    component_info!("main", "Shutdown signal received, draining {} connections", server.conn_count());

    server.stop().await;
    component_info!("main", "fetcp stopped");
    Ok(())
}
