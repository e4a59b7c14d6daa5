use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic per-connection counters plus a start timestamp.
///
/// Atomic increments so the forwarder task and `handle_message` can both
/// update counters concurrently without a lock spanning I/O.
#[derive(Debug)]
pub struct ConnectionMetrics {
    sent: AtomicU64,
    received: AtomicU64,
    started_at: Instant,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

impl Default for ConnectionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
