use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cheap shared counters for the table pipelines. Cloning hands out
/// another handle to the same underlying counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    records_put: AtomicU64,
    records_read: AtomicU64,
    blocks_enqueued: AtomicU64,
    blocks_sent: AtomicU64,
    blocks_read: AtomicU64,
    blocks_dumped: AtomicU64,
    barrier_rounds: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_put(&self, records: u64) {
        self.inner.records_put.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_read(&self, records: u64) {
        self.inner.records_read.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_enqueue(&self) {
        self.inner.blocks_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send(&self) {
        self.inner.blocks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block_read(&self) {
        self.inner.blocks_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dump(&self) {
        self.inner.blocks_dumped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_barrier(&self) {
        self.inner.barrier_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_put: self.inner.records_put.load(Ordering::Relaxed),
            records_read: self.inner.records_read.load(Ordering::Relaxed),
            blocks_enqueued: self.inner.blocks_enqueued.load(Ordering::Relaxed),
            blocks_sent: self.inner.blocks_sent.load(Ordering::Relaxed),
            blocks_read: self.inner.blocks_read.load(Ordering::Relaxed),
            blocks_dumped: self.inner.blocks_dumped.load(Ordering::Relaxed),
            barrier_rounds: self.inner.barrier_rounds.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_put: u64,
    pub records_read: u64,
    pub blocks_enqueued: u64,
    pub blocks_sent: u64,
    pub blocks_read: u64,
    pub blocks_dumped: u64,
    pub barrier_rounds: u64,
}
