//! OHLCV candles
//!
//! Candles are derived data: they are recomputed from the stored trade set
//! on every query and never persisted by the storage backends.

use serde::{Deserialize, Serialize};

/// A single OHLCV candle over the half-open window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    /// Volume-weighted average price over the window
    pub vwap: f64,
    /// Window start, Unix milliseconds (inclusive)
    pub start: i64,
    /// Window end, Unix milliseconds (exclusive)
    pub end: i64,
}

impl Candle {
    /// Validate candle integrity (OHLCV invariants).
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
            && self.end > self.start
    }
}
