//! UTC calendar-day bucket keys
//!
//! List-append backends group a market's trades by the UTC day they were
//! observed in. The key format is `{symbol}-{year}-{month}-{day}` with a
//! zero-based month, so 2009-02-13 renders as `ABC/DEF-2009-1-13`. Existing
//! stores are keyed this way; the format must not change.

use chrono::{DateTime, Datelike, Utc};

use crate::error::StoreError;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// One day bucket touched by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBucket {
    /// Start of the UTC day, Unix milliseconds
    pub start: i64,
    pub key: String,
}

impl DayBucket {
    pub fn end(&self) -> i64 {
        self.start + DAY_MS
    }

    /// Whether the day has fully elapsed at `now`.
    pub fn is_closed(&self, now: i64) -> bool {
        self.end() <= now
    }
}

/// Start of the UTC day containing `timestamp`.
pub fn day_start(timestamp: i64) -> i64 {
    timestamp.div_euclid(DAY_MS) * DAY_MS
}

pub fn day_key(symbol: &str, timestamp: i64) -> Result<String, StoreError> {
    let dt = DateTime::<Utc>::from_timestamp_millis(timestamp)
        .ok_or(StoreError::InvalidTimestamp(timestamp))?;
    Ok(format!(
        "{}-{}-{}-{}",
        symbol,
        dt.year(),
        dt.month0(),
        dt.day()
    ))
}

/// Every day bucket the inclusive range `[from, to]` touches, oldest first.
pub fn buckets_for_range(symbol: &str, from: i64, to: i64) -> Result<Vec<DayBucket>, StoreError> {
    let mut buckets = Vec::new();
    if to < from {
        return Ok(buckets);
    }
    let mut start = day_start(from);
    while start <= to {
        buckets.push(DayBucket {
            start,
            key: day_key(symbol, start)?,
        });
        start += DAY_MS;
    }
    Ok(buckets)
}

pub fn keys_for_range(symbol: &str, from: i64, to: i64) -> Result<Vec<String>, StoreError> {
    Ok(buckets_for_range(symbol, from, to)?
        .into_iter()
        .map(|b| b.key)
        .collect())
}

/// Yesterday's and today's buckets, relative to `now`.
pub fn recent_buckets(symbol: &str, now: i64) -> Result<Vec<DayBucket>, StoreError> {
    buckets_for_range(symbol, now - DAY_MS, now)
}

/// Key of a scalar value, e.g. the ingestion cursor.
pub fn number_key(symbol: &str, key: &str) -> String {
    format!("{}-NUM-{}", symbol, key)
}
