//! Canonical trade records
//!
//! A trade is the taker's view of one fill: price, size, taker side and the
//! time it was observed. Trades are immutable once stored.

use serde::{Deserialize, Serialize};

/// Taker side of a trade.
///
/// `None` is used when the side is unknown, e.g. for trades decoded from
/// compact storage records that do not carry a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    None,
    /// Taker bought (lifted the ask)
    Buy,
    /// Taker sold (hit the bid)
    Sell,
}

impl Side {
    /// Side from an order's bid flag.
    pub fn from_bid(bid: bool) -> Self {
        if bid {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::None => "none",
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// Parse the relational column representation ("None", "Buy", "Sell").
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "None" => Some(Side::None),
            "Buy" => Some(Side::Buy),
            "Sell" => Some(Side::Sell),
            _ => None,
        }
    }

    /// Relational column representation.
    pub fn label(&self) -> &'static str {
        match self {
            Side::None => "None",
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

/// A single executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub side: Side,
    pub size: f64,
    /// Observation time, Unix milliseconds
    pub timestamp: i64,
}

impl Trade {
    pub fn new(price: f64, side: Side, size: f64, timestamp: i64) -> Self {
        Self {
            price,
            side,
            size,
            timestamp,
        }
    }

    /// Quote value of the trade (price × size)
    pub fn value(&self) -> f64 {
        self.price * self.size
    }

    /// Finite, non-negative price and size with a non-negative timestamp.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite()
            && self.size.is_finite()
            && self.price >= 0.0
            && self.size >= 0.0
            && self.timestamp >= 0
    }
}
