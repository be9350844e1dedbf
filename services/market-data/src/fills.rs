//! Fill extraction
//!
//! Turns decoded event queue records into canonical trades. Only taker
//! fills produce a trade: the maker record of the same match describes the
//! counterparty leg and would double-count volume.
//!
//! Native quantity → decimal conversion is pluggable through [`FillParser`];
//! [`NativeScale`] implements the exchange's standard conversion from base
//! and quote token decimals.

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::trade::{Side, Trade};

use crate::events::EventRecord;

/// Price, size and taker side of one fill in decimal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedFill {
    pub price: f64,
    pub size: f64,
    pub side: Side,
}

/// Converts a fill's native amounts into decimal price and size.
pub trait FillParser: Send + Sync {
    /// Returns `None` when the record cannot be priced (e.g. zero base quantity).
    fn parse_fill(&self, event: &EventRecord) -> Option<ParsedFill>;
}

/// Conversion using the market's base/quote token multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeScale {
    /// 10^base_decimals
    pub base_multiplier: u64,
    /// 10^quote_decimals
    pub quote_multiplier: u64,
}

impl NativeScale {
    pub fn new(base_multiplier: u64, quote_multiplier: u64) -> Self {
        Self {
            base_multiplier,
            quote_multiplier,
        }
    }

    /// Build from token decimals, e.g. (9, 6) for SOL/USDC.
    pub fn from_decimals(base_decimals: u32, quote_decimals: u32) -> Option<Self> {
        Some(Self {
            base_multiplier: 10u64.checked_pow(base_decimals)?,
            quote_multiplier: 10u64.checked_pow(quote_decimals)?,
        })
    }
}

/// Exact integer division rendered as a float: quotient plus remainder fraction.
fn divide_to_f64(numerator: u128, denominator: u128) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    Some(quotient as f64 + remainder as f64 / denominator as f64)
}

impl FillParser for NativeScale {
    fn parse_fill(&self, event: &EventRecord) -> Option<ParsedFill> {
        let released = event.native_quantity_released as u128;
        let paid = event.native_quantity_paid as u128;
        let fee = event.native_fee_or_rebate as u128;
        let base_mul = self.base_multiplier as u128;
        let quote_mul = self.quote_multiplier as u128;
        let maker = event.flags.maker;

        // Takers pay fees on top of the trade, makers receive rebates.
        let side = Side::from_bid(event.flags.bid);
        let (quote_before_fees, base_native) = if event.flags.bid {
            let quote = if maker {
                paid.checked_add(fee)?
            } else {
                paid.checked_sub(fee)?
            };
            (quote, released)
        } else {
            let quote = if maker {
                released.checked_sub(fee)?
            } else {
                released.checked_add(fee)?
            };
            (quote, paid)
        };

        if base_native == 0 {
            return None;
        }

        let price = divide_to_f64(
            quote_before_fees.checked_mul(base_mul)?,
            quote_mul.checked_mul(base_native)?,
        )?;
        let size = divide_to_f64(base_native, base_mul)?;

        Some(ParsedFill { price, size, side })
    }
}

/// Filters events to taker fills and converts them into trades.
#[derive(Debug, Clone)]
pub struct FillExtractor<P> {
    parser: P,
}

impl<P: FillParser> FillExtractor<P> {
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    /// Extract trades from decoded events, stamping each with `observed_at`.
    ///
    /// The event queue carries no per-event time, so trades are stamped with
    /// the poll's wall-clock time.
    pub fn extract(&self, events: &[EventRecord], observed_at: i64) -> Vec<Trade> {
        events
            .iter()
            .filter(|e| e.is_taker_fill())
            .filter_map(|e| {
                let parsed = self.parser.parse_fill(e);
                if parsed.is_none() {
                    debug!(order_id = e.order_id, "Skipping unpriceable fill");
                }
                parsed
            })
            .map(|f| Trade::new(f.price, f.side, f.size, observed_at))
            .filter(|t| {
                if !t.is_valid() {
                    debug!(price = t.price, size = t.size, "Skipping malformed fill");
                }
                t.is_valid()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventFlags;

    const NOW: i64 = 1_700_000_000_000;

    fn fill(bid: bool, maker: bool, released: u64, paid: u64, fee: u64) -> EventRecord {
        EventRecord {
            flags: EventFlags {
                fill: true,
                out: false,
                bid,
                maker,
            },
            open_orders_slot: 0,
            fee_tier: 0,
            native_quantity_released: released,
            native_quantity_paid: paid,
            native_fee_or_rebate: fee,
            order_id: 1,
            open_orders: [0u8; 32],
            client_order_id: 0,
        }
    }

    fn sol_usdc() -> NativeScale {
        NativeScale::from_decimals(9, 6).unwrap()
    }

    #[test]
    fn test_taker_bid_price_excludes_fee() {
        // Bought 2 SOL for 50 USDC + 0.02 USDC fee
        let event = fill(true, false, 2_000_000_000, 50_020_000, 20_000);
        let parsed = sol_usdc().parse_fill(&event).unwrap();
        assert_eq!(parsed.side, Side::Buy);
        assert!((parsed.price - 25.0).abs() < 1e-9);
        assert!((parsed.size - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_taker_ask_price_includes_fee() {
        // Sold 4 SOL, received 99.96 USDC after a 0.04 USDC fee
        let event = fill(false, false, 99_960_000, 4_000_000_000, 40_000);
        let parsed = sol_usdc().parse_fill(&event).unwrap();
        assert_eq!(parsed.side, Side::Sell);
        assert!((parsed.price - 25.0).abs() < 1e-9);
        assert!((parsed.size - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_maker_bid_adds_rebate() {
        let event = fill(true, true, 1_000_000_000, 24_990_000, 10_000);
        let parsed = sol_usdc().parse_fill(&event).unwrap();
        assert!((parsed.price - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_base_quantity_is_unpriceable() {
        let event = fill(true, false, 0, 100, 0);
        assert!(sol_usdc().parse_fill(&event).is_none());
    }

    #[test]
    fn test_from_decimals_overflow() {
        assert!(NativeScale::from_decimals(20, 6).is_none());
    }

    #[test]
    fn test_extract_keeps_only_taker_fills() {
        let mut out_event = fill(true, false, 1_000_000_000, 25_000_000, 0);
        out_event.flags.fill = false;
        out_event.flags.out = true;

        let events = vec![
            fill(true, false, 1_000_000_000, 25_000_000, 0),
            fill(false, true, 25_000_000, 1_000_000_000, 0),
            out_event,
            fill(false, false, 50_000_000, 2_000_000_000, 0),
        ];

        let trades = FillExtractor::new(sol_usdc()).extract(&events, NOW);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Buy);
        assert_eq!(trades[1].side, Side::Sell);
        assert!(trades.iter().all(|t| t.timestamp == NOW));
    }

    #[test]
    fn test_extract_never_emits_maker_or_non_fill() {
        let events: Vec<EventRecord> = (0..16u8)
            .map(|bits| {
                let mut e = fill(true, false, 1_000_000_000, 25_000_000, 0);
                e.flags = EventFlags::from_byte(bits);
                e
            })
            .collect();
        let trades = FillExtractor::new(sol_usdc()).extract(&events, NOW);
        let takers = events.iter().filter(|e| e.is_taker_fill()).count();
        assert_eq!(trades.len(), takers);
        assert_eq!(takers, 4);
    }

    struct NanParser;

    impl FillParser for NanParser {
        fn parse_fill(&self, _event: &EventRecord) -> Option<ParsedFill> {
            Some(ParsedFill {
                price: f64::NAN,
                size: 1.0,
                side: Side::Buy,
            })
        }
    }

    #[test]
    fn test_malformed_parsed_fill_is_dropped() {
        let extractor = FillExtractor::new(NanParser);
        assert!(extractor.extract(&[fill(true, false, 1, 1, 0)], NOW).is_empty());
    }
}
