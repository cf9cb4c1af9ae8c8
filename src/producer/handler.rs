//! Per-connection handler.
//!
//! Reads consumer opcodes until the stream ends, the consumer violates the
//! protocol, or the handler is closed from outside (eviction or a failed
//! broadcast write).
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use super::connection_id::ConnectionId;
use super::registry::{Member, MembershipRegistry};
use super::stats::ProducerStats;
use crate::clock::now_millis;
use crate::error::{Result, TimecastError};
use crate::protocol::{read_consumer_opcode, ConsumerOpcode};
use crate::transport_error;

pub struct ClientHandler<W = OwnedWriteHalf> {
    id: ConnectionId,
    peer_addr: SocketAddr,
    // Zero until the first REGISTER or KEEP_ALIVE arrives
    last_keep_alive: AtomicI64,
    closed: AtomicBool,
    shutdown: Notify,
    writer: Mutex<Option<W>>,
}

impl<W> std::fmt::Debug for ClientHandler<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandler")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("last_keep_alive", &self.last_keep_alive.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<W> ClientHandler<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(id: ConnectionId, peer_addr: SocketAddr, writer: W) -> Arc<Self> {
        Arc::new(Self {
            id,
            peer_addr,
            last_keep_alive: AtomicI64::new(0),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Record a liveness signal. The stored time never moves backwards.
    pub fn touch(&self) {
        self.last_keep_alive.fetch_max(now_millis(), Ordering::AcqRel);
    }

    /// Read loop. Returns once the connection is finished; the handler is
    /// closed and out of the registry by then.
    pub async fn run<R>(
        self: Arc<Self>,
        mut reader: R,
        registry: Arc<MembershipRegistry>,
        stats: Arc<ProducerStats>,
    ) where
        R: AsyncRead + Unpin + Send,
    {
        debug!("[Connection<{}>] Serving {}", self.id, self.peer_addr);

        while !self.is_closed() {
            let received = tokio::select! {
                _ = self.shutdown.notified() => break,
                received = read_consumer_opcode(&mut reader) => received,
            };

            match received {
                Ok(ConsumerOpcode::Register) => {
                    // Touch before inserting so a concurrent sweep never sees
                    // a registered member without a timestamp.
                    self.touch();
                    ProducerStats::incr(&stats.registrations);
                    let member: Arc<dyn Member> = self.clone();
                    if registry.add(member).await {
                        debug!("[Connection<{}>] Registered", self.id);
                    }
                }
                Ok(ConsumerOpcode::KeepAlive) => {
                    self.touch();
                    ProducerStats::incr(&stats.keep_alives);
                }
                Err(TimecastError::Protocol(e)) => {
                    ProducerStats::incr(&stats.protocol_errors);
                    warn!(
                        "[Connection<{}>] Closing {} after protocol violation: {}",
                        self.id, self.peer_addr, e
                    );
                    break;
                }
                Err(e) if e.is_disconnect() => {
                    debug!("[Connection<{}>] Peer disconnected", self.id);
                    break;
                }
                Err(e) => {
                    debug!("[Connection<{}>] Read failed: {}", self.id, e);
                    break;
                }
            }
        }

        registry.remove(self.id).await;
        self.close().await;
        drop(reader);
        debug!("[Connection<{}>] Finished", self.id);
    }
}

#[async_trait]
impl<W> Member for ClientHandler<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn last_keep_alive(&self) -> i64 {
        self.last_keep_alive.load(Ordering::Acquire)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn send(&self, packet: Bytes) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| transport_error!("connection {} is closed", self.id))?;
        writer.write_all(&packet).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // notify_one keeps a permit, so a read loop that is not parked yet
        // still sees it.
        self.shutdown.notify_one();
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}
