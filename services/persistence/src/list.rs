//! List-append-per-day store
//!
//! Trades are appended as base64 records to one list per market and UTC
//! day. A range query reads every touched day list, concatenates them in
//! day order and filters to the range. Within a day, append order is the
//! delivery order, so chronological ingestion yields chronological reads.
//!
//! The list primitives are abstracted by [`ListBackend`] so the same
//! bucketing runs over memory or the file journal.

use std::sync::Arc;

use market_data::codec::{Base64TradeCoder, Coder};
use tracing::debug;
use types::ids::MarketId;
use types::trade::Trade;

use crate::bucket::{buckets_for_range, day_key, number_key, recent_buckets, DayBucket};
use crate::cache::BucketCache;
use crate::error::StoreError;
use crate::store::TradeStore;

/// String-list and string-scalar primitives, keyed by text.
pub trait ListBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Append one value to the end of the list at `key`.
    fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Every value of the list at `key` in append order; empty if absent.
    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Source of the current time, Unix milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// [`TradeStore`] over a [`ListBackend`], bucketed by UTC day.
pub struct DayBucketStore<B> {
    backend: B,
    coder: Base64TradeCoder,
    cache: BucketCache,
    clock: Clock,
}

impl<B: ListBackend> DayBucketStore<B> {
    pub fn new(backend: B, cache_size: usize) -> Self {
        Self::with_clock(backend, cache_size, system_clock())
    }

    pub fn with_clock(backend: B, cache_size: usize, clock: Clock) -> Self {
        Self {
            backend,
            coder: Base64TradeCoder,
            cache: BucketCache::new(cache_size),
            clock,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cached_buckets(&self) -> usize {
        self.cache.len()
    }

    /// Decoded trades of one bucket. Closed days are served from the cache.
    fn load_bucket(&self, bucket: &DayBucket) -> Result<Arc<Vec<Trade>>, StoreError> {
        let closed = bucket.is_closed((self.clock)());
        if closed {
            if let Some(trades) = self.cache.get(&bucket.key) {
                return Ok(trades);
            }
        }

        // Read before the backend so a concurrent append voids the insert
        let generation = self.cache.generation(&bucket.key);
        let records = self.backend.lrange(&bucket.key)?;
        let trades = records
            .iter()
            .map(|r| self.coder.decode(r))
            .collect::<Result<Vec<_>, _>>()?;
        let trades = Arc::new(trades);

        if closed && self.cache.insert(bucket.key.clone(), Arc::clone(&trades), generation) {
            debug!(key = %bucket.key, trades = trades.len(), "Cached closed day bucket");
        }
        Ok(trades)
    }
}

impl<B: ListBackend> TradeStore for DayBucketStore<B> {
    fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn store_trade(&self, market: &MarketId, trade: &Trade) -> Result<(), StoreError> {
        let key = day_key(market.as_str(), trade.timestamp)?;
        let record = self.coder.encode(trade)?;
        self.backend.rpush(&key, &record)?;
        // Late trades may land in a day that is already cached
        self.cache.invalidate(&key);
        Ok(())
    }

    fn load_trades(&self, market: &MarketId, from: i64, to: i64) -> Result<Vec<Trade>, StoreError> {
        let mut trades = Vec::new();
        for bucket in buckets_for_range(market.as_str(), from, to)? {
            let loaded = self.load_bucket(&bucket)?;
            trades.extend(
                loaded
                    .iter()
                    .filter(|t| from <= t.timestamp && t.timestamp <= to)
                    .copied(),
            );
        }
        Ok(trades)
    }

    fn load_recent_trades(
        &self,
        market: &MarketId,
        limit: usize,
        now: i64,
    ) -> Result<Vec<Trade>, StoreError> {
        let mut trades = Vec::new();
        for bucket in recent_buckets(market.as_str(), now)? {
            trades.extend(self.load_bucket(&bucket)?.iter().copied());
        }
        let skip = trades.len().saturating_sub(limit);
        Ok(trades.into_iter().skip(skip).rev().collect())
    }

    fn store_number(&self, market: &MarketId, key: &str, value: u64) -> Result<(), StoreError> {
        self.backend
            .set(&number_key(market.as_str(), key), &value.to_string())
    }

    fn load_number(&self, market: &MarketId, key: &str) -> Result<Option<u64>, StoreError> {
        let key = number_key(market.as_str(), key);
        match self.backend.get(&key)? {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| StoreError::InvalidValue { key, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::DAY_MS;
    use crate::memory::MemoryBackend;
    use crate::store::CURSOR_KEY;
    use market_data::candles::is_chronological;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::thread;
    use types::trade::Side;

    const DAY0: i64 = 1_700_006_400_000; // 2023-11-15T00:00:00Z

    fn market() -> MarketId {
        MarketId::new("SOL/USDC")
    }

    fn store_at(now: Arc<AtomicI64>) -> DayBucketStore<MemoryBackend> {
        let clock: Clock = Arc::new(move || now.load(Ordering::SeqCst));
        DayBucketStore::with_clock(MemoryBackend::new(), 16, clock)
    }

    fn trade(price: f64, ts: i64) -> Trade {
        Trade::new(price, Side::Buy, 1.0, ts)
    }

    #[test]
    fn test_trades_land_in_day_buckets() {
        let store = DayBucketStore::new(MemoryBackend::new(), 16);
        store.store_trade(&market(), &trade(1.0, DAY0 + 10)).unwrap();
        store.store_trade(&market(), &trade(2.0, DAY0 + DAY_MS + 10)).unwrap();

        assert_eq!(store.backend().lrange("SOL/USDC-2023-10-15").unwrap().len(), 1);
        assert_eq!(store.backend().lrange("SOL/USDC-2023-10-16").unwrap().len(), 1);
    }

    #[test]
    fn test_load_trades_filters_range_and_keeps_order() {
        let store = DayBucketStore::new(MemoryBackend::new(), 16);
        for i in 0..10 {
            store
                .store_trade(&market(), &trade(i as f64, DAY0 + i * 6 * 3_600_000))
                .unwrap();
        }
        let loaded = store
            .load_trades(&market(), DAY0 + 3_600_000, DAY0 + 36 * 3_600_000)
            .unwrap();
        let prices: Vec<f64> = loaded.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(is_chronological(&loaded));
        assert!(loaded.iter().all(|t| t.side == Side::None));
    }

    #[test]
    fn test_markets_are_isolated() {
        let store = DayBucketStore::new(MemoryBackend::new(), 16);
        store.store_trade(&market(), &trade(1.0, DAY0)).unwrap();
        let other = MarketId::new("BTC/USDC");
        assert!(store.load_trades(&other, DAY0, DAY0 + 1).unwrap().is_empty());
    }

    #[test]
    fn test_load_candles_over_buckets() {
        let store = DayBucketStore::new(MemoryBackend::new(), 16);
        store.store_trade(&market(), &trade(10.0, DAY0 + 100)).unwrap();
        store.store_trade(&market(), &trade(12.0, DAY0 + 200)).unwrap();
        store.store_trade(&market(), &trade(9.0, DAY0 + DAY_MS + 100)).unwrap();

        let candles = store
            .load_candles(&market(), DAY_MS, DAY0, DAY0 + 2 * DAY_MS)
            .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 10.0);
        assert_eq!(candles[0].close, 12.0);
        assert_eq!(candles[1].open, 9.0);
    }

    #[test]
    fn test_recent_trades_most_recent_first() {
        let now = DAY0 + DAY_MS + 1_000;
        let store = store_at(Arc::new(AtomicI64::new(now)));
        // Two days ago: outside the recent window
        store.store_trade(&market(), &trade(0.0, DAY0 - 10)).unwrap();
        for i in 1..=4 {
            store.store_trade(&market(), &trade(i as f64, DAY0 + i)).unwrap();
        }
        store.store_trade(&market(), &trade(5.0, now - 10)).unwrap();

        let recent = store.load_recent_trades(&market(), 3, now).unwrap();
        let prices: Vec<f64> = recent.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![5.0, 4.0, 3.0]);

        let all = store.load_recent_trades(&market(), 50, now).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_only_closed_days_are_cached() {
        let clock = Arc::new(AtomicI64::new(DAY0 + 1_000));
        let store = store_at(Arc::clone(&clock));
        store.store_trade(&market(), &trade(1.0, DAY0 + 10)).unwrap();

        store.load_trades(&market(), DAY0, DAY0 + 2_000).unwrap();
        assert_eq!(store.cached_buckets(), 0);

        clock.store(DAY0 + DAY_MS + 1, Ordering::SeqCst);
        store.load_trades(&market(), DAY0, DAY0 + 2_000).unwrap();
        assert_eq!(store.cached_buckets(), 1);
    }

    #[test]
    fn test_late_write_invalidates_cached_day() {
        let clock = Arc::new(AtomicI64::new(DAY0 + 2 * DAY_MS));
        let store = store_at(clock);
        store.store_trade(&market(), &trade(1.0, DAY0 + 10)).unwrap();
        assert_eq!(store.load_trades(&market(), DAY0, DAY0 + DAY_MS - 1).unwrap().len(), 1);

        store.store_trade(&market(), &trade(2.0, DAY0 + 20)).unwrap();
        assert_eq!(store.load_trades(&market(), DAY0, DAY0 + DAY_MS - 1).unwrap().len(), 2);
    }

    /// Memory backend whose `lrange` can be held open by the test.
    struct GatedBackend {
        inner: MemoryBackend,
        gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl ListBackend for GatedBackend {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.rpush(key, value)
        }

        fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
            let records = self.inner.lrange(key)?;
            let gate = self.gate.lock().unwrap().take();
            if let Some((read_done, resume)) = gate {
                read_done.send(()).unwrap();
                resume.recv().unwrap();
            }
            Ok(records)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }
    }

    #[test]
    fn test_append_during_closed_day_read_is_not_lost() {
        let (read_done_tx, read_done_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        let backend = GatedBackend {
            inner: MemoryBackend::new(),
            gate: Mutex::new(Some((read_done_tx, resume_rx))),
        };
        let clock: Clock = Arc::new(|| DAY0 + DAY_MS + 1_000);
        let store = Arc::new(DayBucketStore::with_clock(backend, 16, clock));
        store.store_trade(&market(), &trade(1.0, DAY0 + 10)).unwrap();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.load_trades(&market(), DAY0, DAY0 + DAY_MS - 1).unwrap())
        };
        // The reader holds a one-trade snapshot; a late trade lands meanwhile
        read_done_rx.recv().unwrap();
        store.store_trade(&market(), &trade(2.0, DAY0 + 20)).unwrap();
        resume_tx.send(()).unwrap();
        assert_eq!(reader.join().unwrap().len(), 1);

        assert_eq!(store.backend().inner.lrange("SOL/USDC-2023-10-15").unwrap().len(), 2);
        assert_eq!(store.load_trades(&market(), DAY0, DAY0 + DAY_MS - 1).unwrap().len(), 2);
    }

    #[test]
    fn test_cursor_absent_then_stored() {
        let store = DayBucketStore::new(MemoryBackend::new(), 16);
        assert_eq!(store.load_number(&market(), CURSOR_KEY).unwrap(), None);
        store.store_number(&market(), CURSOR_KEY, 4_294_967_295).unwrap();
        assert_eq!(
            store.load_number(&market(), CURSOR_KEY).unwrap(),
            Some(4_294_967_295)
        );
        assert_eq!(
            store.backend().get("SOL/USDC-NUM-LASTSEQ").unwrap().as_deref(),
            Some("4294967295")
        );
    }

    #[test]
    fn test_garbage_cursor_is_error() {
        let store = DayBucketStore::new(MemoryBackend::new(), 16);
        store.backend().set("SOL/USDC-NUM-LASTSEQ", "abc").unwrap();
        assert!(matches!(
            store.load_number(&market(), CURSOR_KEY),
            Err(StoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_corrupt_record_is_error() {
        let store = DayBucketStore::new(MemoryBackend::new(), 16);
        store.backend().rpush("SOL/USDC-2023-10-15", "%%%").unwrap();
        assert!(matches!(
            store.load_trades(&market(), DAY0, DAY0 + 1),
            Err(StoreError::Codec(_))
        ));
    }
}
