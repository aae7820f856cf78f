//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections.
//! - Assigns each connection a `SessionToken`.
//! - Spawns a per-session task to handle I/O; all sessions share one
//!   `Broker`.
//!
//! The per-session logic lives in the `session` module.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ipc_core::{Broker, SessionToken};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::session;
use crate::types::{Outbound, OutboundRx, OutboundTx};

/// A bound, not yet running, broker server.
pub struct Server {
    listener: TcpListener,
    broker: Arc<Broker>,
    outbound: Arc<Outbound>,
    max_sessions: usize,
    next_token: AtomicU64,
}

impl Server {
    /// Bind the listener and build the broker.
    pub async fn bind(config: &Config) -> anyhow::Result<Self> {
        let addr = config.socket_addr_string();
        let listener = TcpListener::bind(&addr).await?;

        let outbound = Arc::new(Outbound::new());
        let broker = Arc::new(Broker::with_config(outbound.clone(), config.broker_config()));

        Ok(Server {
            listener,
            broker,
            outbound,
            max_sessions: config.max_sessions,
            next_token: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn broker(&self) -> Arc<Broker> {
        self.broker.clone()
    }

    fn next_token(&self) -> SessionToken {
        SessionToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Listening on {}", self.local_addr()?);

        loop {
            let (stream, peer_addr) = self.listener.accept().await?;

            if self.outbound.len() >= self.max_sessions {
                warn!(
                    "Rejecting connection from {}: max_sessions ({}) reached",
                    peer_addr, self.max_sessions
                );
                // Just drop the stream; peer will see connection closed.
                continue;
            }

            let token = self.next_token();
            info!(session = %token, peer = %peer_addr, "accepted connection");

            // Create outbound channel for this session.
            let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();
            self.outbound.register(token, out_tx);

            let broker = self.broker.clone();
            let outbound = self.outbound.clone();

            tokio::spawn(async move {
                if let Err(e) = session::run_session(token, stream, broker, outbound, out_rx).await
                {
                    warn!(session = %token, error = %e, "session ended with error");
                } else {
                    info!(session = %token, "session closed");
                }
            });
        }
    }
}

/// Run the TCP server with the given configuration.
pub async fn run(config: Config) -> anyhow::Result<()> {
    Server::bind(&config).await?.run().await
}
