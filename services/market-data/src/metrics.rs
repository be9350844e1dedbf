//! Ingestion metrics
//!
//! Counters and latency samples for the polling pipeline. Overruns,
//! rejected fills and storage failures are recoverable conditions that
//! only show up here and in the logs, so they are tracked explicitly.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counters shared by every polling loop of one process.
pub struct IngestMetrics {
    // Polling
    pub polls: AtomicU64,
    pub poll_failures: AtomicU64,
    pub poll_latency_ms: Mutex<LatencyTracker>,

    // Events
    pub events_decoded: AtomicU64,
    pub events_skipped: AtomicU64,

    // Trades
    pub trades_stored: AtomicU64,
    pub duplicates_suppressed: AtomicU64,
    pub store_failures: AtomicU64,

    // Supervision
    pub loop_restarts: AtomicU64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            polls: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            poll_latency_ms: Mutex::new(LatencyTracker::new(1000)),
            events_decoded: AtomicU64::new(0),
            events_skipped: AtomicU64::new(0),
            trades_stored: AtomicU64::new(0),
            duplicates_suppressed: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            loop_restarts: AtomicU64::new(0),
        }
    }

    /// Record a completed poll.
    pub fn record_poll(&self, latency_ms: u64, events_decoded: u64, events_skipped: u64) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.events_decoded.fetch_add(events_decoded, Ordering::Relaxed);
        self.events_skipped.fetch_add(events_skipped, Ordering::Relaxed);
        if let Ok(mut tracker) = self.poll_latency_ms.lock() {
            tracker.record(latency_ms);
        }
    }

    /// Record a poll that failed before any trade was stored.
    pub fn record_poll_failure(&self) {
        self.poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trades_stored(&self, count: u64) {
        self.trades_stored.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_duplicates(&self, count: u64) {
        self.duplicates_suppressed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.loop_restarts.fetch_add(1, Ordering::Relaxed);
    }

    /// Export counters as a sorted map.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("polls".to_string(), self.polls.load(Ordering::Relaxed));
        m.insert("poll_failures".to_string(), self.poll_failures.load(Ordering::Relaxed));
        m.insert("events_decoded".to_string(), self.events_decoded.load(Ordering::Relaxed));
        m.insert("events_skipped".to_string(), self.events_skipped.load(Ordering::Relaxed));
        m.insert("trades_stored".to_string(), self.trades_stored.load(Ordering::Relaxed));
        m.insert(
            "duplicates_suppressed".to_string(),
            self.duplicates_suppressed.load(Ordering::Relaxed),
        );
        m.insert("store_failures".to_string(), self.store_failures.load(Ordering::Relaxed));
        m.insert("loop_restarts".to_string(), self.loop_restarts.load(Ordering::Relaxed));
        if let Ok(tracker) = self.poll_latency_ms.lock() {
            if let Some(p99) = tracker.percentile(99) {
                m.insert("poll_latency_p99_ms".to_string(), p99);
            }
            if let Some(avg) = tracker.average() {
                m.insert("poll_latency_avg_ms".to_string(), avg);
            }
        }
        m
    }
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding window of latency samples.
pub struct LatencyTracker {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (p as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn average(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as u64)
    }
}
