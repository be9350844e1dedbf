//! Compact record codecs
//!
//! Fixed-size little-endian binary records rendered as base64 text, for
//! stores that keep values as strings (list-of-strings and key/value
//! backends).
//!
//! Trade record (14 bytes → 20 base64 chars):
//!
//! ```text
//! [0..4)   price  f32
//! [4..8)   size   f32
//! [8..14)  time   u48 (Unix ms)
//! ```
//!
//! Candle record (36 bytes → 48 base64 chars): six f32 values (open, close,
//! high, low, volume, vwap) followed by start and end as u48.
//!
//! The 32-bit floats lose precision beyond ~7 significant digits. The trade
//! record has no room for a side, so decoded trades carry [`Side::None`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use types::candle::Candle;
use types::trade::{Side, Trade};

pub const TRADE_RECORD_SIZE: usize = 14;
pub const CANDLE_RECORD_SIZE: usize = 36;

/// Largest timestamp representable in 6 bytes.
pub const MAX_TIMESTAMP: i64 = (1 << 48) - 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("record length {actual}, expected {expected}")]
    WrongLength { expected: usize, actual: usize },

    #[error("timestamp {0} outside the 48-bit record range")]
    TimestampOutOfRange(i64),
}

/// Encodes values to and from their text record form.
pub trait Coder<T> {
    fn encode(&self, value: &T) -> Result<String, CodecError>;
    fn decode(&self, text: &str) -> Result<T, CodecError>;
}

// ── Byte helpers ──────────────────────────────────────────────────────

fn put_f32(buf: &mut [u8], offset: usize, value: f64) {
    buf[offset..offset + 4].copy_from_slice(&(value as f32).to_le_bytes());
}

fn get_f32(buf: &[u8], offset: usize) -> f64 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset + 4]);
    f32::from_le_bytes(raw) as f64
}

fn put_u48(buf: &mut [u8], offset: usize, value: i64) -> Result<(), CodecError> {
    if !(0..=MAX_TIMESTAMP).contains(&value) {
        return Err(CodecError::TimestampOutOfRange(value));
    }
    buf[offset..offset + 6].copy_from_slice(&value.to_le_bytes()[..6]);
    Ok(())
}

fn get_u48(buf: &[u8], offset: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw[..6].copy_from_slice(&buf[offset..offset + 6]);
    i64::from_le_bytes(raw)
}

fn decode_record<const N: usize>(text: &str) -> Result<[u8; N], CodecError> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
    bytes.try_into().map_err(|b: Vec<u8>| CodecError::WrongLength {
        expected: N,
        actual: b.len(),
    })
}

// ── Trades ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Base64TradeCoder;

impl Coder<Trade> for Base64TradeCoder {
    fn encode(&self, trade: &Trade) -> Result<String, CodecError> {
        let mut buf = [0u8; TRADE_RECORD_SIZE];
        put_f32(&mut buf, 0, trade.price);
        put_f32(&mut buf, 4, trade.size);
        put_u48(&mut buf, 8, trade.timestamp)?;
        Ok(STANDARD.encode(buf))
    }

    fn decode(&self, text: &str) -> Result<Trade, CodecError> {
        let buf = decode_record::<TRADE_RECORD_SIZE>(text)?;
        Ok(Trade::new(
            get_f32(&buf, 0),
            Side::None,
            get_f32(&buf, 4),
            get_u48(&buf, 8),
        ))
    }
}

// ── Candles ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Base64CandleCoder;

impl Coder<Candle> for Base64CandleCoder {
    fn encode(&self, candle: &Candle) -> Result<String, CodecError> {
        let mut buf = [0u8; CANDLE_RECORD_SIZE];
        let values = [
            candle.open,
            candle.close,
            candle.high,
            candle.low,
            candle.volume,
            candle.vwap,
        ];
        for (i, value) in values.iter().enumerate() {
            put_f32(&mut buf, i * 4, *value);
        }
        put_u48(&mut buf, 24, candle.start)?;
        put_u48(&mut buf, 30, candle.end)?;
        Ok(STANDARD.encode(buf))
    }

    fn decode(&self, text: &str) -> Result<Candle, CodecError> {
        let buf = decode_record::<CANDLE_RECORD_SIZE>(text)?;
        Ok(Candle {
            open: get_f32(&buf, 0),
            close: get_f32(&buf, 4),
            high: get_f32(&buf, 8),
            low: get_f32(&buf, 12),
            volume: get_f32(&buf, 16),
            vwap: get_f32(&buf, 20),
            start: get_u48(&buf, 24),
            end: get_u48(&buf, 30),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_enough(a: f64, b: f64) -> bool {
        (a - b).abs() <= b.abs() * 1e-6
    }

    #[test]
    fn test_trade_record_length() {
        let trade = Trade::new(25.125, Side::Buy, 3.5, 1_700_000_000_123);
        let text = Base64TradeCoder.encode(&trade).unwrap();
        assert_eq!(text.len(), 20);
    }

    #[test]
    fn test_trade_decode_drops_side() {
        let trade = Trade::new(25.125, Side::Sell, 3.5, 1_700_000_000_123);
        let text = Base64TradeCoder.encode(&trade).unwrap();
        let decoded = Base64TradeCoder.decode(&text).unwrap();
        assert_eq!(decoded.side, Side::None);
        assert_eq!(decoded.timestamp, 1_700_000_000_123);
        assert_eq!(decoded.price, 25.125);
        assert_eq!(decoded.size, 3.5);
    }

    #[test]
    fn test_trade_precision_within_f32() {
        let trade = Trade::new(0.123_456_789, Side::Buy, 98_765.4321, 1);
        let decoded = Base64TradeCoder
            .decode(&Base64TradeCoder.encode(&trade).unwrap())
            .unwrap();
        assert!(close_enough(decoded.price, trade.price));
        assert!(close_enough(decoded.size, trade.size));
    }

    #[test]
    fn test_candle_record_length_and_fields() {
        let candle = Candle {
            open: 10.0,
            close: 8.0,
            high: 12.0,
            low: 8.0,
            volume: 4.0,
            vwap: 9.5,
            start: 1_700_000_000_000,
            end: 1_700_000_060_000,
        };
        let text = Base64CandleCoder.encode(&candle).unwrap();
        assert_eq!(text.len(), 48);
        assert_eq!(Base64CandleCoder.decode(&text).unwrap(), candle);
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let trade = Trade::new(1.0, Side::Buy, 1.0, -1);
        assert_eq!(
            Base64TradeCoder.encode(&trade),
            Err(CodecError::TimestampOutOfRange(-1))
        );
    }

    #[test]
    fn test_oversized_timestamp_rejected() {
        let trade = Trade::new(1.0, Side::Buy, 1.0, MAX_TIMESTAMP + 1);
        assert!(Base64TradeCoder.encode(&trade).is_err());
        let trade = Trade::new(1.0, Side::Buy, 1.0, MAX_TIMESTAMP);
        let decoded = Base64TradeCoder
            .decode(&Base64TradeCoder.encode(&trade).unwrap())
            .unwrap();
        assert_eq!(decoded.timestamp, MAX_TIMESTAMP);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Base64TradeCoder.decode("not base64!!"),
            Err(CodecError::InvalidBase64(_))
        ));
        // Valid base64, wrong record size
        assert_eq!(
            Base64TradeCoder.decode("AAAA"),
            Err(CodecError::WrongLength {
                expected: 14,
                actual: 3
            })
        );
    }
}
