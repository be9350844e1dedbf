//! Query service
//!
//! Validates history and recent-trades requests against the market
//! registry, then reads from the trade store on the blocking pool.

use std::sync::Arc;

use market_data::candles::{snap_range, window_count, Resolution};
use market_data::codec::MAX_TIMESTAMP;
use persistence::list::Clock;
use persistence::{StoreError, TradeStore};
use thiserror::Error;
use tracing::debug;
use types::errors::QueryError;

use crate::markets::{Market, MarketRegistry};
use crate::models::{HistoryResponse, TradeItem, TradesResponse};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("storage task failed: {0}")]
    Task(String),
}

pub struct HistoryService {
    store: Arc<dyn TradeStore>,
    markets: Arc<MarketRegistry>,
    max_candles: i64,
    recent_limit: usize,
    clock: Clock,
}

impl HistoryService {
    pub fn new(
        store: Arc<dyn TradeStore>,
        markets: Arc<MarketRegistry>,
        max_candles: i64,
        recent_limit: usize,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            markets,
            max_candles,
            recent_limit,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn TradeStore> {
        &self.store
    }

    /// The market and resolution a history request names.
    pub fn series(
        &self,
        symbol: &str,
        resolution: &str,
    ) -> Result<(&Arc<Market>, Resolution), QueryError> {
        let market = self.markets.by_name(symbol);
        let res = Resolution::from_key(resolution);
        match (market, res) {
            (Some(market), Some(res)) => Ok((market, res)),
            _ => Err(QueryError::UnknownSeries {
                symbol: symbol.to_string(),
                resolution: resolution.to_string(),
                valid_symbol: market.is_some(),
                valid_resolution: res.is_some(),
            }),
        }
    }

    /// Candles for `symbol` over `[from_secs, to_secs]`, snapped outward to
    /// the resolution.
    pub async fn history(
        &self,
        symbol: &str,
        resolution: &str,
        from_secs: i64,
        to_secs: i64,
    ) -> Result<HistoryResponse, HistoryError> {
        let (market, res) = self.series(symbol, resolution)?;

        let from = to_millis("from", from_secs)?;
        let to = to_millis("to", to_secs)?;
        if from > to {
            return Err(QueryError::InvalidRange { from, to }.into());
        }

        let resolution_ms = res.millis();
        let (from, to) = snap_range(resolution_ms, from, to).ok_or_else(|| {
            QueryError::InvalidParameter {
                name: "to".to_string(),
                value: to_secs.to_string(),
            }
        })?;
        let requested = window_count(resolution_ms, from, to);
        if requested > self.max_candles {
            return Err(QueryError::TooManyCandles {
                requested,
                max: self.max_candles,
            }
            .into());
        }

        let store = Arc::clone(&self.store);
        let id = market.id.clone();
        let candles = tokio::task::spawn_blocking(move || {
            store.load_candles(&id, resolution_ms, from, to)
        })
        .await
        .map_err(|e| HistoryError::Task(e.to_string()))??;

        debug!(
            market = %market.id,
            resolution = res.key(),
            from,
            to,
            count = candles.len(),
            "History query"
        );
        Ok(HistoryResponse::from_candles(&candles))
    }

    /// Most recent trades of the market at `address`, newest first.
    pub async fn recent_trades(&self, address: &str) -> Result<TradesResponse, HistoryError> {
        let market = self
            .markets
            .by_address(address)
            .ok_or_else(|| QueryError::UnknownMarket {
                address: address.to_string(),
            })?;

        let store = Arc::clone(&self.store);
        let id = market.id.clone();
        let limit = self.recent_limit;
        let now = (self.clock)();
        let trades = tokio::task::spawn_blocking(move || store.load_recent_trades(&id, limit, now))
            .await
            .map_err(|e| HistoryError::Task(e.to_string()))??;

        Ok(TradesResponse {
            success: true,
            data: trades.iter().map(|t| TradeItem::new(market, t)).collect(),
        })
    }
}

/// Seconds to milliseconds, limited to timestamps a trade can carry.
fn to_millis(name: &str, secs: i64) -> Result<i64, QueryError> {
    secs.checked_mul(1000)
        .filter(|ms| (0..=MAX_TIMESTAMP).contains(ms))
        .ok_or_else(|| QueryError::InvalidParameter {
            name: name.to_string(),
            value: secs.to_string(),
        })
}
