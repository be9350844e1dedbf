//! Relational backend (SQLite)
//!
//! One row per trade, range queries by `(symbol, timestamp)`. Trades are
//! returned ordered by `(timestamp, id)`, so rows written in the same
//! millisecond keep insertion order. Scalars live in a separate `numbers`
//! table.
//!
//! Connections come from a bounded r2d2 pool; each operation checks one
//! out and returns it when the guard drops, on success and on error.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::info;
use types::ids::MarketId;
use types::trade::{Side, Trade};

use crate::bucket::{day_start, number_key, DAY_MS};
use crate::error::StoreError;
use crate::store::TradeStore;

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS trades (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol    TEXT    NOT NULL,
    price     REAL    NOT NULL,
    size      REAL    NOT NULL,
    side      TEXT    NOT NULL CHECK (side IN ('None', 'Buy', 'Sell')),
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS trades_symbol_timestamp ON trades (symbol, timestamp);
CREATE TABLE IF NOT EXISTS numbers (
    key   TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
";

pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (or create) the database file with a pool of at most `pool_size`
    /// connections.
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL;")
        });
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_secs(10))
            .build(manager)?;

        pool.get()?.execute_batch(SCHEMA)?;
        info!(path = %path.display(), pool_size, "SQLite store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn row_to_trade(row: &rusqlite::Row<'_>) -> rusqlite::Result<Trade> {
    let label: String = row.get(2)?;
    let side = Side::from_label(&label).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown side {:?}", label).into(),
        )
    })?;
    Ok(Trade::new(row.get(0)?, side, row.get(1)?, row.get(3)?))
}

impl TradeStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn store_trade(&self, market: &MarketId, trade: &Trade) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO trades (symbol, price, size, side, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                market.as_str(),
                trade.price,
                trade.size,
                trade.side.label(),
                trade.timestamp
            ],
        )?;
        Ok(())
    }

    fn load_trades(&self, market: &MarketId, from: i64, to: i64) -> Result<Vec<Trade>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(
            "SELECT price, size, side, timestamp
             FROM trades
             WHERE symbol = ?1 AND timestamp >= ?2 AND timestamp <= ?3
             ORDER BY timestamp, id",
        )?;
        let trades = stmt
            .query_map(params![market.as_str(), from, to], row_to_trade)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trades)
    }

    fn load_recent_trades(
        &self,
        market: &MarketId,
        limit: usize,
        now: i64,
    ) -> Result<Vec<Trade>, StoreError> {
        // Same window as the day-bucket stores: start of yesterday onward
        let since = day_start(now - DAY_MS);
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(
            "SELECT price, size, side, timestamp
             FROM trades
             WHERE symbol = ?1 AND timestamp >= ?2
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let trades = stmt
            .query_map(params![market.as_str(), since, limit], row_to_trade)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trades)
    }

    fn store_number(&self, market: &MarketId, key: &str, value: u64) -> Result<(), StoreError> {
        let key = number_key(market.as_str(), key);
        let stored = i64::try_from(value).map_err(|_| StoreError::InvalidValue {
            key: key.clone(),
            value: value.to_string(),
        })?;
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO numbers (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, stored],
        )?;
        Ok(())
    }

    fn load_number(&self, market: &MarketId, key: &str) -> Result<Option<u64>, StoreError> {
        let key = number_key(market.as_str(), key);
        let conn = self.pool.get()?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM numbers WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match value {
            None => Ok(None),
            Some(v) => u64::try_from(v).map(Some).map_err(|_| StoreError::InvalidValue {
                key,
                value: v.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CURSOR_KEY;
    use market_data::candles::is_chronological;
    use tempfile::TempDir;

    const DAY0: i64 = 1_700_006_400_000;

    fn open(tmp: &TempDir) -> SqliteStore {
        SqliteStore::open(&tmp.path().join("trades.db"), 4).unwrap()
    }

    fn market() -> MarketId {
        MarketId::new("SOL/USDC")
    }

    #[test]
    fn test_store_and_load_keeps_side() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        store
            .store_trade(&market(), &Trade::new(25.5, Side::Sell, 2.0, DAY0))
            .unwrap();
        let trades = store.load_trades(&market(), DAY0, DAY0).unwrap();
        assert_eq!(trades, vec![Trade::new(25.5, Side::Sell, 2.0, DAY0)]);
    }

    #[test]
    fn test_out_of_order_writes_load_chronologically() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        for (price, ts) in [(3.0, DAY0 + 30), (1.0, DAY0 + 10), (2.0, DAY0 + 20), (4.0, DAY0 + 30)] {
            store
                .store_trade(&market(), &Trade::new(price, Side::Buy, 1.0, ts))
                .unwrap();
        }
        let trades = store.load_trades(&market(), DAY0, DAY0 + 100).unwrap();
        let prices: Vec<f64> = trades.iter().map(|t| t.price).collect();
        // Equal timestamps keep insertion order
        assert_eq!(prices, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(is_chronological(&trades));
    }

    #[test]
    fn test_recent_trades_window_and_limit() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        let now = DAY0 + 36 * 3_600_000;
        store
            .store_trade(&market(), &Trade::new(0.0, Side::Buy, 1.0, DAY0 - 1))
            .unwrap();
        for i in 1..=5 {
            store
                .store_trade(&market(), &Trade::new(i as f64, Side::Buy, 1.0, DAY0 + i))
                .unwrap();
        }
        let recent = store.load_recent_trades(&market(), 3, now).unwrap();
        let prices: Vec<f64> = recent.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![5.0, 4.0, 3.0]);
        assert_eq!(store.load_recent_trades(&market(), 50, now).unwrap().len(), 5);
    }

    #[test]
    fn test_numbers_upsert() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp);
        assert_eq!(store.load_number(&market(), CURSOR_KEY).unwrap(), None);
        store.store_number(&market(), CURSOR_KEY, 10).unwrap();
        store.store_number(&market(), CURSOR_KEY, 11).unwrap();
        assert_eq!(store.load_number(&market(), CURSOR_KEY).unwrap(), Some(11));
    }

    #[test]
    fn test_data_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = open(&tmp);
            store
                .store_trade(&market(), &Trade::new(1.0, Side::Buy, 1.0, DAY0))
                .unwrap();
            store.store_number(&market(), CURSOR_KEY, 7).unwrap();
        }
        let store = open(&tmp);
        assert_eq!(store.load_trades(&market(), DAY0, DAY0).unwrap().len(), 1);
        assert_eq!(store.load_number(&market(), CURSOR_KEY).unwrap(), Some(7));
    }

    #[test]
    fn test_pool_is_shared_across_threads() {
        let tmp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(open(&tmp));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    let market = MarketId::new(format!("M{}/USDC", i));
                    for j in 0..10 {
                        store
                            .store_trade(&market, &Trade::new(1.0, Side::Buy, 1.0, DAY0 + j))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for i in 0..4 {
            let market = MarketId::new(format!("M{}/USDC", i));
            assert_eq!(store.load_trades(&market, DAY0, DAY0 + 10).unwrap().len(), 10);
        }
        assert!(store.pool().state().connections <= 4);
    }
}
