use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// In-memory counter. Monotonically increasing.
#[derive(Default)]
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn increment(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// In-memory gauge. Can go up or down.
#[derive(Default)]
struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }
    fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for the event pipeline. One instance per tracker; shared with the
/// emitter so both ends of the pipeline record into the same cells.
#[derive(Default)]
pub struct PipelineMetrics {
    tracked: Counter,
    stored: Counter,
    sent: Counter,
    retried: Counter,
    evicted: Counter,
    payload_collisions: Counter,
    queue_depth: Gauge,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tracked(&self) {
        self.tracked.increment(1);
    }

    pub fn record_stored(&self) {
        self.stored.increment(1);
    }

    pub fn record_sent(&self, n: u64) {
        self.sent.increment(n);
    }

    pub fn record_retried(&self, n: u64) {
        self.retried.increment(n);
    }

    pub fn record_evicted(&self, n: u64) {
        self.evicted.increment(n);
    }

    pub fn record_payload_collision(&self, n: u64) {
        self.payload_collisions.increment(n);
    }

    pub fn set_queue_depth(&self, depth: i64) {
        self.queue_depth.set(depth);
    }

    /// Point-in-time copy of every cell.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tracked: self.tracked.get(),
            stored: self.stored.get(),
            sent: self.sent.get(),
            retried: self.retried.get(),
            evicted: self.evicted.get(),
            payload_collisions: self.payload_collisions.get(),
            queue_depth: self.queue_depth.get(),
        }
    }
}

/// A point-in-time copy of the pipeline counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub tracked: u64,
    pub stored: u64,
    pub sent: u64,
    pub retried: u64,
    pub evicted: u64,
    pub payload_collisions: u64,
    pub queue_depth: i64,
}
