//! The storage capability every backend implements.

use market_data::candles::aggregate_windows;
use types::candle::Candle;
use types::ids::MarketId;
use types::trade::Trade;

use crate::error::StoreError;

/// Key under which the ingestion loop keeps its sequence cursor.
pub const CURSOR_KEY: &str = "LASTSEQ";

/// Time-bucketed trade storage.
///
/// Implementations must return trades in chronological order: candle
/// `open`/`close` are taken from the first and last trade as delivered.
pub trait TradeStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Append one trade. Appends are not idempotent.
    fn store_trade(&self, market: &MarketId, trade: &Trade) -> Result<(), StoreError>;

    /// Trades with `from <= timestamp <= to`, oldest first.
    fn load_trades(&self, market: &MarketId, from: i64, to: i64) -> Result<Vec<Trade>, StoreError>;

    /// Candles for consecutive `resolution_ms` windows starting at `from`.
    fn load_candles(
        &self,
        market: &MarketId,
        resolution_ms: i64,
        from: i64,
        to: i64,
    ) -> Result<Vec<Candle>, StoreError> {
        let trades = self.load_trades(market, from, to)?;
        Ok(aggregate_windows(&trades, resolution_ms, from, to))
    }

    /// Up to `limit` trades from yesterday's and today's buckets, most
    /// recent first.
    fn load_recent_trades(
        &self,
        market: &MarketId,
        limit: usize,
        now: i64,
    ) -> Result<Vec<Trade>, StoreError>;

    fn store_number(&self, market: &MarketId, key: &str, value: u64) -> Result<(), StoreError>;

    /// `None` when the value was never stored.
    fn load_number(&self, market: &MarketId, key: &str) -> Result<Option<u64>, StoreError>;
}
