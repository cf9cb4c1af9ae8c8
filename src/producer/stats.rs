//! Producer statistics.
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated with relaxed atomics from any task
#[derive(Debug, Default)]
pub struct ProducerStats {
    pub connections_accepted: AtomicU64,
    pub registrations: AtomicU64,
    pub keep_alives: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub evictions: AtomicU64,
    pub broadcasts: AtomicU64,
    pub messages_sent: AtomicU64,
    pub send_errors: AtomicU64,
}

/// Point-in-time copy of [`ProducerStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrozenProducerStats {
    pub connections_accepted: u64,
    pub registrations: u64,
    pub keep_alives: u64,
    pub protocol_errors: u64,
    pub evictions: u64,
    pub broadcasts: u64,
    pub messages_sent: u64,
    pub send_errors: u64,
}

impl ProducerStats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn freeze(&self) -> FrozenProducerStats {
        FrozenProducerStats {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            keep_alives: self.keep_alives.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freeze_snapshots_counters() {
        let stats = ProducerStats::default();
        ProducerStats::incr(&stats.registrations);
        ProducerStats::incr(&stats.registrations);
        ProducerStats::add(&stats.messages_sent, 5);

        let frozen = stats.freeze();
        assert_eq!(frozen.registrations, 2);
        assert_eq!(frozen.messages_sent, 5);
        assert_eq!(frozen.evictions, 0);

        ProducerStats::incr(&stats.evictions);
        assert_eq!(frozen.evictions, 0);
        assert_eq!(stats.freeze().evictions, 1);
    }
}
