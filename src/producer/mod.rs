//! The producer: owns the membership registry, the listener, and the
//! broadcast scheduler, and supervises their tasks.
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

pub mod connection_id;
pub mod handler;
pub mod listener;
pub mod registry;
pub mod scheduler;
pub mod stats;

use crate::error::{Result, TimecastError};
use crate::settings::ProducerSettings;
pub use connection_id::ConnectionId;
pub use handler::ClientHandler;
pub use listener::Listener;
pub use registry::{BroadcastReport, Member, MembershipRegistry};
pub use scheduler::{BroadcastScheduler, TickReport};
pub use stats::{FrozenProducerStats, ProducerStats};

pub struct Producer {
    settings: ProducerSettings,
    local_addr: SocketAddr,
    registry: Arc<MembershipRegistry>,
    stats: Arc<ProducerStats>,
    listener: Option<Listener>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("local_addr", &self.local_addr)
            .field("started", &self.listener.is_none())
            .finish()
    }
}

impl Producer {
    /// Validate settings and bind the listening socket. Nothing runs until
    /// [`Producer::start`].
    pub async fn bind(settings: ProducerSettings) -> Result<Self> {
        settings.validate()?;

        let stats = Arc::new(ProducerStats::default());
        let registry = Arc::new(MembershipRegistry::new(settings.write_timeout, stats.clone()));
        let listener =
            Listener::bind(settings.listen_address, registry.clone(), stats.clone()).await?;
        let local_addr = listener.local_addr;

        Ok(Self {
            settings,
            local_addr,
            registry,
            stats,
            listener: Some(listener),
            tasks: Vec::new(),
        })
    }

    /// Spawn the listener and the broadcast scheduler
    pub fn start(&mut self) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| TimecastError::Concurrency("producer already started".to_string()))?;

        let scheduler = BroadcastScheduler::new(self.registry.clone(), &self.settings);

        info!("[Producer] Starting on {}", self.local_addr);
        self.tasks.push(tokio::spawn(listener.run()));
        self.tasks.push(tokio::spawn(scheduler.run()));
        Ok(())
    }

    /// Stop accepting and broadcasting, and close every registered consumer
    pub async fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        let closed = self.registry.clear().await;
        info!("[Producer] Stopped, closed {} registered consumers", closed);
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> FrozenProducerStats {
        self.stats.freeze()
    }

    pub async fn member_count(&self) -> usize {
        self.registry.len().await
    }
}
