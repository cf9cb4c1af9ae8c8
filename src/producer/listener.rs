//! TCP listener: accepts consumers and spawns a handler for each one.
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::connection_id::ConnectionIdGenerator;
use super::handler::ClientHandler;
use super::registry::MembershipRegistry;
use super::stats::ProducerStats;
use crate::error::{Result, TimecastError};

#[derive(Debug)]
pub struct Listener {
    pub local_addr: SocketAddr,
    socket: TcpListener,
    registry: Arc<MembershipRegistry>,
    stats: Arc<ProducerStats>,
    ids: ConnectionIdGenerator,
}

impl Listener {
    pub async fn bind(
        bind_addr: SocketAddr,
        registry: Arc<MembershipRegistry>,
        stats: Arc<ProducerStats>,
    ) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr).await.map_err(|e| {
            TimecastError::Transport(format!("Failed to bind {}: {}", bind_addr, e))
        })?;

        let local_addr = socket.local_addr().map_err(|e| {
            TimecastError::Transport(format!("Failed to read local address: {}", e))
        })?;

        Ok(Self {
            local_addr,
            socket,
            registry,
            stats,
            ids: ConnectionIdGenerator::default(),
        })
    }

    /// Accept until accepting fails. Handler tasks live in a JoinSet owned
    /// by this loop, so aborting the listener also aborts its handlers.
    pub async fn run(self) {
        info!("[Listener] Accepting consumers on {}", self.local_addr);
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.socket.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("[Listener] Accept failed, no longer accepting: {}", e);
                            break;
                        }
                    };
                    ProducerStats::incr(&self.stats.connections_accepted);
                    let _ = stream.set_nodelay(true);

                    let id = self.ids.next_id();
                    let (reader, writer) = stream.into_split();
                    let handler = ClientHandler::new(id, peer_addr, writer);
                    debug!("[Listener] Accepted connection {} from {}", id, peer_addr);
                    handlers.spawn(handler.run(reader, self.registry.clone(), self.stats.clone()));
                }
                Some(_) = handlers.join_next() => {}
            }
        }

        // Accept failures leave running handlers untouched.
        while handlers.join_next().await.is_some() {}
    }
}
