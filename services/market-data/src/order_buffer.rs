//! Order buffer: dedup for snapshot-style fill sources
//!
//! Some sources expose only the set of currently visible fills, with no
//! sequence number to resume from. Polling such a source returns the same
//! fills again and again, so the buffer remembers which fills it already
//! emitted and suppresses them.
//!
//! Downstream storage is not idempotent: emitting a fill twice inflates
//! candle volume and skews vwap. Within the time-to-live window a fill id
//! is emitted at most once.
//!
//! The buffer is owned by exactly one polling loop and is never shared.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::ids::FillId;
use types::trade::{Side, Trade};

/// A fill as reported by a snapshot source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFill {
    pub order_id: u128,
    pub maker: bool,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    /// Execution time reported by the source, Unix milliseconds
    pub timestamp: i64,
}

/// Configuration for the order buffer.
#[derive(Debug, Clone)]
pub struct OrderBufferConfig {
    /// How long an emitted id is remembered, milliseconds.
    pub time_to_live_ms: i64,
    /// Minimum time between eviction scans, milliseconds.
    pub cleanup_interval_ms: i64,
}

impl Default for OrderBufferConfig {
    fn default() -> Self {
        Self {
            time_to_live_ms: 60 * 60 * 1000,
            cleanup_interval_ms: 60 * 1000,
        }
    }
}

/// TTL-bounded set of already emitted fill ids.
#[derive(Debug)]
pub struct OrderBuffer {
    /// Fill id -> time it was first emitted
    seen: HashMap<FillId, i64>,
    last_cleanup: i64,
    config: OrderBufferConfig,
    /// Total fills emitted since creation.
    emitted: u64,
    /// Total fills suppressed as duplicates since creation.
    suppressed: u64,
}

impl OrderBuffer {
    pub fn new(config: OrderBufferConfig) -> Self {
        Self {
            seen: HashMap::new(),
            last_cleanup: 0,
            config,
            emitted: 0,
            suppressed: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(OrderBufferConfig::default())
    }

    /// Return trades for the taker fills not emitted before.
    ///
    /// Every newly emitted id is recorded with `now`. Maker fills are dropped
    /// since they mirror a taker fill of the same match.
    pub fn filter_new_trades(&mut self, fills: &[SnapshotFill], now: i64) -> Vec<Trade> {
        self.maybe_cleanup(now);

        let mut trades = Vec::new();
        for fill in fills.iter().filter(|f| !f.maker) {
            let id = FillId::from_order_id(fill.order_id);
            if self.seen.contains_key(&id) {
                self.suppressed += 1;
                continue;
            }
            self.seen.insert(id, now);
            self.emitted += 1;
            trades.push(Trade::new(fill.price, fill.side, fill.size, fill.timestamp));
        }
        trades
    }

    /// Evict ids older than the TTL, at most once per cleanup interval.
    fn maybe_cleanup(&mut self, now: i64) {
        if now <= self.last_cleanup + self.config.cleanup_interval_ms {
            return;
        }
        let ttl = self.config.time_to_live_ms;
        let before = self.seen.len();
        self.seen.retain(|_, recorded| now - *recorded <= ttl);
        self.last_cleanup = now;

        let evicted = before - self.seen.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.seen.len(), "Order buffer cleanup");
        }
    }

    /// Number of ids currently remembered.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
