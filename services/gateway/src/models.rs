//! HTTP response bodies
//!
//! Field names follow the TradingView UDF protocol and the recent-trades
//! format charting clients already consume.

use std::collections::BTreeMap;

use market_data::candles::Resolution;
use serde::{Deserialize, Serialize};
use types::candle::Candle;
use types::trade::Trade;

use crate::markets::Market;

#[derive(Debug, Serialize, Deserialize)]
pub struct TvConfig {
    pub supported_resolutions: Vec<String>,
    pub supports_group_request: bool,
    pub supports_marks: bool,
    pub supports_search: bool,
    pub supports_timescale_marks: bool,
}

impl TvConfig {
    pub fn new() -> Self {
        Self {
            supported_resolutions: supported_resolutions(),
            supports_group_request: false,
            supports_marks: false,
            supports_search: true,
            supports_timescale_marks: false,
        }
    }
}

impl Default for TvConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn supported_resolutions() -> Vec<String> {
    Resolution::all().iter().map(|r| r.key().to_string()).collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub ticker: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub session: String,
    pub exchange: String,
    pub listed_exchange: String,
    pub timezone: String,
    pub has_intraday: bool,
    pub supported_resolutions: Vec<String>,
    pub minmov: u32,
    pub pricescale: u32,
}

impl SymbolInfo {
    pub fn new(symbol: &str, pricescale: u32) -> Self {
        Self {
            name: symbol.to_string(),
            ticker: symbol.to_string(),
            description: symbol.to_string(),
            kind: "Spot".to_string(),
            session: "24x7".to_string(),
            exchange: "Mango".to_string(),
            listed_exchange: "Mango".to_string(),
            timezone: "Etc/UTC".to_string(),
            has_intraday: true,
            supported_resolutions: supported_resolutions(),
            minmov: 1,
            pricescale,
        }
    }
}

/// Candle history as parallel arrays; `t` is in seconds.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub s: String,
    pub t: Vec<i64>,
    pub c: Vec<f64>,
    pub o: Vec<f64>,
    pub h: Vec<f64>,
    pub l: Vec<f64>,
    pub v: Vec<f64>,
}

impl HistoryResponse {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut resp = Self {
            s: "ok".to_string(),
            ..Default::default()
        };
        for candle in candles {
            resp.t.push(candle.start / 1000);
            resp.c.push(candle.close);
            resp.o.push(candle.open);
            resp.h.push(candle.high);
            resp.l.push(candle.low);
            resp.v.push(candle.volume);
        }
        resp
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeItem {
    pub market: String,
    pub market_address: String,
    pub price: f64,
    pub size: f64,
    pub side: String,
    /// Unix milliseconds
    pub time: i64,
    pub order_id: String,
    pub fee_cost: f64,
}

impl TradeItem {
    pub fn new(market: &Market, trade: &Trade) -> Self {
        Self {
            market: market.config.name.clone(),
            market_address: market.config.address.clone(),
            price: trade.price,
            size: trade.size,
            side: trade.side.as_str().to_string(),
            time: trade.timestamp,
            order_id: String::new(),
            fee_cost: 0.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TradesResponse {
    pub success: bool,
    pub data: Vec<TradeItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub markets: usize,
    pub collecting: bool,
    pub metrics: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_response_uses_seconds() {
        let candle = Candle {
            open: 1.0,
            close: 2.0,
            high: 3.0,
            low: 0.5,
            volume: 4.0,
            vwap: 1.5,
            start: 1_700_000_040_000,
            end: 1_700_000_100_000,
        };
        let resp = HistoryResponse::from_candles(&[candle]);
        assert_eq!(resp.s, "ok");
        assert_eq!(resp.t, vec![1_700_000_040]);
        assert_eq!((resp.o[0], resp.h[0], resp.l[0], resp.c[0], resp.v[0]), (1.0, 3.0, 0.5, 2.0, 4.0));
    }

    #[test]
    fn test_symbol_info_shape() {
        let json = serde_json::to_value(SymbolInfo::new("SOL/USDC", 1000)).unwrap();
        assert_eq!(json["type"], "Spot");
        assert_eq!(json["pricescale"], 1000);
        assert_eq!(json["supported_resolutions"][9], "1D");
    }
}
