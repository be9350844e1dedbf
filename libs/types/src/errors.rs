//! Error types shared across the service
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Validation errors at the query boundary.
///
/// These are rejected synchronously, before any data is loaded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Symbol and resolution are checked together so callers can report
    /// which of the two was rejected.
    #[error("Unsupported series: symbol {symbol:?}, resolution {resolution:?}")]
    UnknownSeries {
        symbol: String,
        resolution: String,
        valid_symbol: bool,
        valid_resolution: bool,
    },

    #[error("Invalid parameter {name}: {value:?}")]
    InvalidParameter { name: String, value: String },

    #[error("Unknown market address: {address}")]
    UnknownMarket { address: String },

    #[error("Invalid range: from {from} is after to {to}")]
    InvalidRange { from: i64, to: i64 },

    #[error("Range spans {requested} candles, maximum is {max}")]
    TooManyCandles { requested: i64, max: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_display() {
        let err = QueryError::UnknownSeries {
            symbol: "SOL/USDC".to_string(),
            resolution: "7".to_string(),
            valid_symbol: true,
            valid_resolution: false,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported series: symbol \"SOL/USDC\", resolution \"7\""
        );
    }

    #[test]
    fn test_too_many_candles_display() {
        let err = QueryError::TooManyCandles {
            requested: 20_000,
            max: 10_000,
        };
        assert!(err.to_string().contains("20000"));
        assert!(err.to_string().contains("10000"));
    }
}
