//! Broadcast scheduler.
//!
//! Fires on an absolute schedule: each deadline is the previous deadline plus
//! the interval, so scheduling jitter does not accumulate into drift. Every
//! tick first sweeps expired members, then broadcasts the current time to the
//! ones left.
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::registry::{BroadcastReport, MembershipRegistry};
use crate::clock::now_millis;
use crate::protocol::ProducerMessage;
use crate::settings::ProducerSettings;

pub struct BroadcastScheduler {
    registry: Arc<MembershipRegistry>,
    broadcast_interval: Duration,
    keep_alive_timeout_ms: i64,
}

/// What one tick did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evicted: usize,
    pub broadcast: BroadcastReport,
}

impl BroadcastScheduler {
    pub fn new(registry: Arc<MembershipRegistry>, settings: &ProducerSettings) -> Self {
        Self {
            registry,
            broadcast_interval: settings.broadcast_interval,
            keep_alive_timeout_ms: settings.keep_alive_timeout_ms(),
        }
    }

    /// Sweep, then broadcast. Evicted members never receive this tick's TIME.
    pub async fn tick(&self) -> TickReport {
        let cutoff = now_millis().saturating_sub(self.keep_alive_timeout_ms);
        let evicted = self.registry.sweep(cutoff).await;

        let broadcast = self
            .registry
            .broadcast(|| ProducerMessage::Time(now_millis()).encode())
            .await;

        if evicted > 0 || !broadcast.failed.is_empty() {
            info!(
                "[Scheduler] Evicted {} timed out, dropped {} unwritable, sent TIME to {}",
                evicted,
                broadcast.failed.len(),
                broadcast.delivered
            );
        } else {
            debug!("[Scheduler] Sent TIME to {} consumers", broadcast.delivered);
        }

        TickReport { evicted, broadcast }
    }

    /// Tick forever. The first tick fires immediately.
    pub async fn run(self) {
        info!(
            "[Scheduler] Broadcasting every {}ms, evicting after {}ms of silence",
            self.broadcast_interval.as_millis(),
            self.keep_alive_timeout_ms
        );
        let mut ticker = interval(self.broadcast_interval);
        // Burst keeps deadlines at start + n * interval: a late tick is
        // followed by catch-up ticks instead of shifting the schedule.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
