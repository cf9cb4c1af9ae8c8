//! Membership registry: the set of consumers currently receiving broadcasts.
//!
//! Every structural access (add, remove, sweep, broadcast) goes through one
//! mutex, so a sweep or broadcast never observes a half-updated set and two
//! mutations never race. A member's own keep-alive timestamp is read without
//! that lock.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::connection_id::ConnectionId;
use super::stats::ProducerStats;
use crate::error::Result;

/// Something the registry can track and write to
#[async_trait]
pub trait Member: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Milliseconds since epoch of the last REGISTER or KEEP_ALIVE
    fn last_keep_alive(&self) -> i64;

    fn is_closed(&self) -> bool;

    /// Write one encoded packet and flush it
    async fn send(&self, packet: Bytes) -> Result<()>;

    /// Release the connection and stop its read loop. Best effort, never fails.
    async fn close(&self);
}

/// Outcome of one broadcast pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<ConnectionId>,
}

pub struct MembershipRegistry {
    members: Mutex<HashMap<ConnectionId, Arc<dyn Member>>>,
    write_timeout: Duration,
    stats: Arc<ProducerStats>,
}

impl std::fmt::Debug for MembershipRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipRegistry")
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

impl MembershipRegistry {
    pub fn new(write_timeout: Duration, stats: Arc<ProducerStats>) -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
            write_timeout,
            stats,
        }
    }

    /// Insert a member. Adding one that is already present is a no-op, and a
    /// closed member is never (re-)admitted.
    ///
    /// Returns true if the member was newly inserted.
    pub async fn add(&self, member: Arc<dyn Member>) -> bool {
        let mut members = self.members.lock().await;
        if member.is_closed() {
            debug!("[Registry] Refusing closed connection {}", member.id());
            return false;
        }
        let id = member.id();
        if members.contains_key(&id) {
            return false;
        }
        members.insert(id, member);
        debug!("[Registry] Added connection {} ({} members)", id, members.len());
        true
    }

    /// Drop a member without closing it. The caller owns the close.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        self.members.lock().await.remove(&id).is_some()
    }

    /// Evict and close every member whose last keep-alive is older than
    /// `minimum_acceptable_time` (ms since epoch). Returns the number evicted.
    pub async fn sweep(&self, minimum_acceptable_time: i64) -> usize {
        let mut members = self.members.lock().await;

        let expired: Vec<ConnectionId> = members
            .values()
            .filter(|member| member.last_keep_alive() < minimum_acceptable_time)
            .map(|member| member.id())
            .collect();

        for id in &expired {
            if let Some(member) = members.remove(id) {
                member.close().await;
                info!(
                    "[Registry] Evicted connection {} (last keep-alive {}ms before cutoff)",
                    id,
                    minimum_acceptable_time - member.last_keep_alive()
                );
            }
        }

        ProducerStats::add(&self.stats.evictions, expired.len());
        expired.len()
    }

    /// Write a freshly built packet to every member.
    ///
    /// All writes run concurrently, each under its own write timeout, so one
    /// stalled member holds the pass for at most one timeout. A member whose
    /// write fails or times out is closed and removed; delivery to the
    /// remaining members carries on.
    pub async fn broadcast<F>(&self, mut build_packet: F) -> BroadcastReport
    where
        F: FnMut() -> Bytes + Send,
    {
        let mut members = self.members.lock().await;
        let mut report = BroadcastReport::default();
        let write_timeout = self.write_timeout;

        let writes = members.iter().map(|(id, member)| {
            let packet = build_packet();
            async move {
                let result = tokio::time::timeout(write_timeout, member.send(packet)).await;
                (*id, result)
            }
        });

        for (id, result) in join_all(writes).await {
            match result {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!("[Registry] Write to connection {} failed: {}", id, e);
                    report.failed.push(id);
                }
                Err(_) => {
                    warn!(
                        "[Registry] Write to connection {} timed out after {}ms",
                        id,
                        write_timeout.as_millis()
                    );
                    report.failed.push(id);
                }
            }
        }

        for id in &report.failed {
            if let Some(member) = members.remove(id) {
                member.close().await;
            }
        }

        ProducerStats::incr(&self.stats.broadcasts);
        ProducerStats::add(&self.stats.messages_sent, report.delivered);
        ProducerStats::add(&self.stats.send_errors, report.failed.len());
        report
    }

    /// Close and drop every member
    pub async fn clear(&self) -> usize {
        let mut members = self.members.lock().await;
        let count = members.len();
        for (_, member) in members.drain() {
            member.close().await;
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.lock().await.contains_key(&id)
    }

    pub async fn member_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.members.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    use super::*;
    use crate::transport_error;

    enum Behavior {
        Ok,
        Fail,
        Hang,
    }

    struct MockMember {
        id: ConnectionId,
        last_keep_alive: AtomicI64,
        closed: AtomicBool,
        behavior: Behavior,
        sent: std::sync::Mutex<Vec<Bytes>>,
    }

    impl MockMember {
        fn new(id: u64, last_keep_alive: i64, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::new(id),
                last_keep_alive: AtomicI64::new(last_keep_alive),
                closed: AtomicBool::new(false),
                behavior,
                sent: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<Bytes> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Member for MockMember {
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
            match self.behavior {
                Behavior::Ok => {
                    self.sent.lock().unwrap().push(packet);
                    Ok(())
                }
                Behavior::Fail => Err(transport_error!("peer reset")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::Release);
        }
    }

    fn registry() -> MembershipRegistry {
        MembershipRegistry::new(Duration::from_millis(50), Arc::new(ProducerStats::default()))
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let registry = registry();
        let member = MockMember::new(1, 1000, Behavior::Ok);

        assert!(registry.add(member.clone()).await);
        assert!(!registry.add(member.clone()).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(ConnectionId::new(1)).await);
    }

    #[tokio::test]
    async fn test_closed_member_is_never_admitted() {
        let registry = registry();
        let member = MockMember::new(1, 1000, Behavior::Ok);
        member.close().await;

        assert!(!registry.add(member).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_expired_members() {
        let registry = registry();
        let stale = MockMember::new(1, 999, Behavior::Ok);
        let boundary = MockMember::new(2, 1000, Behavior::Ok);
        let fresh = MockMember::new(3, 5000, Behavior::Ok);
        registry.add(stale.clone()).await;
        registry.add(boundary.clone()).await;
        registry.add(fresh.clone()).await;

        let evicted = registry.sweep(1000).await;

        assert_eq!(evicted, 1);
        assert!(stale.is_closed());
        assert!(!boundary.is_closed());
        assert!(!fresh.is_closed());
        assert_eq!(
            registry.member_ids().await,
            vec![ConnectionId::new(2), ConnectionId::new(3)]
        );
        assert_eq!(registry.stats.freeze().evictions, 1);
    }

    #[tokio::test]
    async fn test_renewed_member_survives_sweep() {
        let registry = registry();
        let member = MockMember::new(1, 100, Behavior::Ok);
        registry.add(member.clone()).await;

        for now in [1000i64, 2000, 3000, 4000] {
            member.last_keep_alive.store(now, Ordering::Release);
            assert_eq!(registry.sweep(now - 500).await, 0);
        }
        assert!(registry.contains(ConnectionId::new(1)).await);
    }

    #[tokio::test]
    async fn test_broadcast_builds_a_fresh_packet_per_member() {
        let registry = registry();
        let a = MockMember::new(1, 0, Behavior::Ok);
        let b = MockMember::new(2, 0, Behavior::Ok);
        registry.add(a.clone()).await;
        registry.add(b.clone()).await;

        let mut counter = 0u8;
        let report = registry
            .broadcast(|| {
                counter += 1;
                Bytes::from(vec![counter])
            })
            .await;

        assert_eq!(report.delivered, 2);
        assert!(report.failed.is_empty());
        let mut seen: Vec<u8> = a.sent().iter().chain(b.sent().iter()).map(|p| p[0]).collect();
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_broadcast() {
        let registry = registry();
        let good_a = MockMember::new(1, 0, Behavior::Ok);
        let broken = MockMember::new(2, 0, Behavior::Fail);
        let good_b = MockMember::new(3, 0, Behavior::Ok);
        registry.add(good_a.clone()).await;
        registry.add(broken.clone()).await;
        registry.add(good_b.clone()).await;

        let report = registry.broadcast(|| Bytes::from_static(b"t")).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec![ConnectionId::new(2)]);
        assert_eq!(good_a.sent().len(), 1);
        assert_eq!(good_b.sent().len(), 1);
        assert!(broken.is_closed());
        assert!(!registry.contains(ConnectionId::new(2)).await);
        assert_eq!(registry.len().await, 2);

        let stats = registry.stats.freeze();
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.send_errors, 1);
    }

    #[tokio::test]
    async fn test_hung_write_times_out_without_blocking_others() {
        let registry = registry();
        let good = MockMember::new(1, 0, Behavior::Ok);
        let hung = MockMember::new(2, 0, Behavior::Hang);
        registry.add(good.clone()).await;
        registry.add(hung.clone()).await;

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            registry.broadcast(|| Bytes::from_static(b"t")),
        )
        .await
        .expect("broadcast should not hang on a stuck member");

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![ConnectionId::new(2)]);
        assert_eq!(good.sent().len(), 1);
        assert!(hung.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_members_cost_one_write_timeout_in_total() {
        let registry =
            MembershipRegistry::new(Duration::from_secs(1), Arc::new(ProducerStats::default()));
        let good = MockMember::new(1, 0, Behavior::Ok);
        registry.add(good.clone()).await;
        let hung: Vec<Arc<MockMember>> = (2..=6)
            .map(|id| MockMember::new(id, 0, Behavior::Hang))
            .collect();
        for member in &hung {
            registry.add(member.clone()).await;
        }

        let started = tokio::time::Instant::now();
        let report = registry.broadcast(|| Bytes::from_static(b"t")).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed.len(), 5);
        assert_eq!(good.sent().len(), 1);
        assert!(hung.iter().all(|m| m.is_closed()));
        assert_eq!(registry.member_ids().await, vec![ConnectionId::new(1)]);
    }

    #[tokio::test]
    async fn test_clear_closes_everyone() {
        let registry = registry();
        let a = MockMember::new(1, 0, Behavior::Ok);
        let b = MockMember::new(2, 0, Behavior::Ok);
        registry.add(a.clone()).await;
        registry.add(b.clone()).await;

        assert_eq!(registry.clear().await, 2);
        assert!(a.is_closed() && b.is_closed());
        assert!(registry.is_empty().await);
    }
}
