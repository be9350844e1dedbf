//! OHLCV Candle Aggregation
//!
//! Folds an ordered trade set into OHLCV candles over fixed-width,
//! non-overlapping windows. Candles are recomputed from trades on every
//! query; nothing here holds state.
//!
//! `open` and `close` are the first and last selected trades in *input*
//! order. Callers must pass trades in chronological order, which every
//! storage backend guarantees (see [`is_chronological`]).
//!
//! Windows without trades produce no candle at all; a flat zero-volume
//! candle would misreport activity.

use serde::{Deserialize, Serialize};
use types::candle::Candle;
use types::trade::Trade;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Supported candle resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    /// 1 minute
    M1,
    /// 3 minutes
    M3,
    /// 5 minutes
    M5,
    /// 15 minutes
    M15,
    /// 30 minutes
    M30,
    /// 1 hour
    H1,
    /// 2 hours
    H2,
    /// 3 hours
    H3,
    /// 4 hours
    H4,
    /// 1 day
    D1,
}

impl Resolution {
    /// Duration of this resolution in milliseconds.
    pub fn millis(&self) -> i64 {
        match self {
            Resolution::M1 => MINUTE_MS,
            Resolution::M3 => 3 * MINUTE_MS,
            Resolution::M5 => 5 * MINUTE_MS,
            Resolution::M15 => 15 * MINUTE_MS,
            Resolution::M30 => 30 * MINUTE_MS,
            Resolution::H1 => HOUR_MS,
            Resolution::H2 => 2 * HOUR_MS,
            Resolution::H3 => 3 * HOUR_MS,
            Resolution::H4 => 4 * HOUR_MS,
            Resolution::D1 => DAY_MS,
        }
    }

    /// Key used by charting clients ("1", "60", "1D", ...).
    pub fn key(&self) -> &'static str {
        match self {
            Resolution::M1 => "1",
            Resolution::M3 => "3",
            Resolution::M5 => "5",
            Resolution::M15 => "15",
            Resolution::M30 => "30",
            Resolution::H1 => "60",
            Resolution::H2 => "120",
            Resolution::H3 => "180",
            Resolution::H4 => "240",
            Resolution::D1 => "1D",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|r| r.key() == key)
    }

    /// All supported resolutions, shortest first.
    pub fn all() -> &'static [Resolution] {
        &[
            Resolution::M1,
            Resolution::M3,
            Resolution::M5,
            Resolution::M15,
            Resolution::M30,
            Resolution::H1,
            Resolution::H2,
            Resolution::H3,
            Resolution::H4,
            Resolution::D1,
        ]
    }
}

fn floor_to(value: i64, step: i64) -> i64 {
    value.div_euclid(step) * step
}

fn ceil_to(value: i64, step: i64) -> Option<i64> {
    let floored = floor_to(value, step);
    if floored == value {
        Some(value)
    } else {
        floored.checked_add(step)
    }
}

/// Snap a query range outward to resolution multiples.
///
/// `from` is floored, `to` is ceiled; a range that collapses to a point is
/// widened by one resolution so at least one window is queried. `None` when
/// the snapped end does not fit in an `i64`.
pub fn snap_range(resolution_ms: i64, from: i64, to: i64) -> Option<(i64, i64)> {
    let from = floor_to(from, resolution_ms);
    let mut to = ceil_to(to, resolution_ms)?;
    if from == to {
        to = to.checked_add(resolution_ms)?;
    }
    Some((from, to))
}

/// Number of full windows `[from + k·res, from + (k+1)·res)` inside `[from, to]`.
pub fn window_count(resolution_ms: i64, from: i64, to: i64) -> i64 {
    if to <= from {
        0
    } else {
        (to - from) / resolution_ms
    }
}

/// Whether trades are in non-decreasing timestamp order.
pub fn is_chronological(trades: &[Trade]) -> bool {
    trades.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Running OHLCV fold over trades of one window.
struct CandleFold {
    candle: Candle,
    notional: f64,
}

impl CandleFold {
    fn new(first: &Trade, start: i64, end: i64) -> Self {
        Self {
            candle: Candle {
                open: first.price,
                close: first.price,
                high: first.price,
                low: first.price,
                volume: first.size,
                vwap: 0.0,
                start,
                end,
            },
            notional: first.value(),
        }
    }

    fn update(&mut self, trade: &Trade) {
        let c = &mut self.candle;
        c.close = trade.price;
        c.high = c.high.max(trade.price);
        c.low = c.low.min(trade.price);
        c.volume += trade.size;
        self.notional += trade.value();
    }

    fn finish(self) -> Candle {
        let mut candle = self.candle;
        candle.vwap = if candle.volume > 0.0 {
            self.notional / candle.volume
        } else {
            candle.close
        };
        candle
    }
}

fn fold<'a>(mut trades: impl Iterator<Item = &'a Trade>, start: i64, end: i64) -> Option<Candle> {
    let first = trades.next()?;
    let mut acc = CandleFold::new(first, start, end);
    for trade in trades {
        acc.update(trade);
    }
    Some(acc.finish())
}

/// Aggregate the trades with `start <= timestamp < end` into one candle.
///
/// Returns `None` when no trade falls inside the window.
pub fn batch(trades: &[Trade], start: i64, end: i64) -> Option<Candle> {
    fold(
        trades
            .iter()
            .filter(|t| start <= t.timestamp && t.timestamp < end),
        start,
        end,
    )
}

/// Aggregate consecutive windows of `resolution_ms` starting at `from`.
///
/// Equivalent to calling [`batch`] for `[from, from + res)`, advancing by
/// `res` while `from + res <= to`, and keeping only non-empty candles. Trades
/// are distributed to windows in a single pass.
pub fn aggregate_windows(trades: &[Trade], resolution_ms: i64, from: i64, to: i64) -> Vec<Candle> {
    let windows = window_count(resolution_ms, from, to);
    if windows == 0 || resolution_ms <= 0 {
        return Vec::new();
    }
    let end = from + windows * resolution_ms;

    let mut per_window: Vec<Vec<&Trade>> = vec![Vec::new(); windows as usize];
    for trade in trades {
        if from <= trade.timestamp && trade.timestamp < end {
            let idx = ((trade.timestamp - from) / resolution_ms) as usize;
            per_window[idx].push(trade);
        }
    }

    per_window
        .into_iter()
        .enumerate()
        .filter_map(|(idx, bucket)| {
            let start = from + idx as i64 * resolution_ms;
            fold(bucket.into_iter(), start, start + resolution_ms)
        })
        .collect()
}
