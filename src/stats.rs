use crate::engine::BlocklistStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

/// Lock-free request counters.
#[derive(Debug, Default)]
pub struct StatsCollector {
    total_requests: AtomicU64,
    served: AtomicU64,
    decoys: AtomicU64,
    not_found: AtomicU64,
    robots: AtomicU64,
    trap_hits: AtomicU64,
    anonymous_trap_hits: AtomicU64,
    new_blocks: AtomicU64,
    flush_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub served: u64,
    pub decoys: u64,
    pub not_found: u64,
    pub robots: u64,
    pub trap_hits: u64,
    pub anonymous_trap_hits: u64,
    pub new_blocks: u64,
    pub flush_failures: u64,
}

impl StatsCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_served(&self) {
        self.served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decoys(&self) {
        self.decoys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_robots(&self) {
        self.robots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trap_hits(&self) {
        self.trap_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_anonymous_trap_hits(&self) {
        self.anonymous_trap_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_new_blocks(&self) {
        self.new_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_flush_failures(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            served: self.served.load(Ordering::Relaxed),
            decoys: self.decoys.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            robots: self.robots.load(Ordering::Relaxed),
            trap_hits: self.trap_hits.load(Ordering::Relaxed),
            anonymous_trap_hits: self.anonymous_trap_hits.load(Ordering::Relaxed),
            new_blocks: self.new_blocks.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }

    /// Spawns the periodic stats dump. Needs a running tokio runtime.
    pub fn spawn_logger(self: &Arc<Self>, interval: Duration, blocklist: Arc<BlocklistStore>) {
        let stats = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(interval);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                stats.dump_stats(&blocklist);
            }
        });
    }

    fn dump_stats(&self, blocklist: &BlocklistStore) {
        let s = self.snapshot();
        let pct = |n: u64| {
            if s.total_requests > 0 {
                (n as f64 / s.total_requests as f64) * 100.0
            } else {
                0.0
            }
        };

        info!(
            "STATS DUMP: Total: {}, Served: {}, Decoys: {} ({:.1}%), NotFound: {}, Robots: {}, TrapHits: {} (anonymous {}), NewBlocks: {}, FlushFailures: {}, Blocked: {} (pending {})",
            s.total_requests,
            s.served,
            s.decoys,
            pct(s.decoys),
            s.not_found,
            s.robots,
            s.trap_hits,
            s.anonymous_trap_hits,
            s.new_blocks,
            s.flush_failures,
            blocklist.len(),
            blocklist.pending_len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let stats = StatsCollector::new();
        stats.inc_requests();
        stats.inc_requests();
        stats.inc_decoys();
        stats.inc_trap_hits();
        stats.inc_new_blocks();

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.decoys, 1);
        assert_eq!(snap.trap_hits, 1);
        assert_eq!(snap.new_blocks, 1);
        assert_eq!(snap.served, 0);
    }
}
