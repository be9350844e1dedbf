//! End-to-end pipeline tests for the market data core
//!
//! Builds event queue account bytes the way the exchange lays them out,
//! then drives them through decoding, fill extraction and candle
//! aggregation across several polls.

use market_data::candles::{aggregate_windows, is_chronological, snap_range, Resolution};
use market_data::codec::{Base64TradeCoder, Coder};
use market_data::events::{AccountFlags, EventFlags, EventQueueHeader, EventRecord};
use market_data::fills::{FillExtractor, NativeScale};
use market_data::ingestion::decode_recent_events;
use types::trade::{Side, Trade};

const ALLOC_LEN: usize = 16;
const T0: i64 = 1_700_000_040_000;

/// Simulated producer: writes fills into a ring and advances the header.
struct QueueWriter {
    slots: Vec<EventRecord>,
    head: u32,
    count: u32,
    seq_num: u32,
}

impl QueueWriter {
    fn new(seq_num: u32) -> Self {
        Self {
            slots: vec![blank(); ALLOC_LEN],
            head: 0,
            count: 0,
            seq_num,
        }
    }

    /// Push a taker fill and its maker counterpart.
    fn push_match(&mut self, bid: bool, base_lots: u64, quote_native: u64) {
        let (released, paid) = if bid {
            (base_lots, quote_native)
        } else {
            (quote_native, base_lots)
        };
        self.push(fill(bid, false, released, paid));
        self.push(fill(!bid, true, paid, released));
    }

    fn push(&mut self, event: EventRecord) {
        let tail = (self.head as usize + self.count as usize) % ALLOC_LEN;
        self.slots[tail] = event;
        if self.count as usize == ALLOC_LEN {
            self.head = (self.head + 1) % ALLOC_LEN as u32;
        } else {
            self.count += 1;
        }
        self.seq_num = self.seq_num.wrapping_add(1);
    }

    /// The consumer side pops some events, like the crank does on chain.
    fn consume(&mut self, n: u32) {
        let n = n.min(self.count);
        self.head = (self.head + n) % ALLOC_LEN as u32;
        self.count -= n;
    }

    fn bytes(&self) -> Vec<u8> {
        let header = EventQueueHeader {
            account_flags: AccountFlags::event_queue(),
            head: self.head,
            count: self.count,
            seq_num: self.seq_num,
        };
        let mut buf = header.encode().to_vec();
        for event in &self.slots {
            buf.extend_from_slice(&event.encode());
        }
        buf
    }
}

fn blank() -> EventRecord {
    EventRecord {
        flags: EventFlags::from_byte(0),
        open_orders_slot: 0,
        fee_tier: 0,
        native_quantity_released: 0,
        native_quantity_paid: 0,
        native_fee_or_rebate: 0,
        order_id: 0,
        open_orders: [0u8; 32],
        client_order_id: 0,
    }
}

fn fill(bid: bool, maker: bool, released: u64, paid: u64) -> EventRecord {
    EventRecord {
        flags: EventFlags {
            fill: true,
            out: false,
            bid,
            maker,
        },
        native_quantity_released: released,
        native_quantity_paid: paid,
        order_id: 42,
        ..blank()
    }
}

/// One poll of the consumer: returns new trades and the advanced cursor.
fn poll(buf: &[u8], cursor: Option<u32>, now: i64) -> (Vec<Trade>, u32) {
    let recent = decode_recent_events(buf, cursor).expect("decode");
    let extractor = FillExtractor::new(NativeScale::from_decimals(9, 6).unwrap());
    (extractor.extract(&recent.events, now), recent.header.seq_num)
}

#[test]
fn test_first_poll_only_sets_cursor() {
    let mut writer = QueueWriter::new(500);
    writer.push_match(true, 1_000_000_000, 25_000_000);

    let (trades, cursor) = poll(&writer.bytes(), None, T0);
    assert!(trades.is_empty());
    assert_eq!(cursor, 502);
}

#[test]
fn test_polls_yield_each_fill_once() {
    let mut writer = QueueWriter::new(0);
    let (_, mut cursor) = poll(&writer.bytes(), None, T0);

    let mut stored = Vec::new();
    for round in 0..5i64 {
        writer.push_match(round % 2 == 0, 1_000_000_000, 25_000_000 + round as u64 * 1_000_000);
        writer.consume(1);
        let (trades, next) = poll(&writer.bytes(), Some(cursor), T0 + round * 20_000);
        cursor = next;
        stored.extend(trades);
    }

    assert_eq!(stored.len(), 5);
    assert!(is_chronological(&stored));
    assert_eq!(stored[0].side, Side::Buy);
    assert_eq!(stored[1].side, Side::Sell);
    assert!((stored[4].price - 29.0).abs() < 1e-9);

    // Polling again without new events yields nothing
    let (trades, _) = poll(&writer.bytes(), Some(cursor), T0 + 200_000);
    assert!(trades.is_empty());
}

#[test]
fn test_overrun_loses_oldest_events_only() {
    let mut writer = QueueWriter::new(10);
    let (_, cursor) = poll(&writer.bytes(), None, T0);

    // 12 matches = 24 events into a 16-slot ring
    for i in 0..12u64 {
        writer.push_match(true, 1_000_000_000, (20 + i) * 1_000_000);
    }
    let recent = decode_recent_events(&writer.bytes(), Some(cursor)).unwrap();
    assert_eq!(recent.events.len(), ALLOC_LEN - 1);
    assert_eq!(recent.skipped as usize, 24 - (ALLOC_LEN - 1));

    // The newest match survives intact at the end
    let (trades, _) = poll(&writer.bytes(), Some(cursor), T0);
    let last = trades.last().unwrap();
    assert!((last.price - 31.0).abs() < 1e-9);
}

#[test]
fn test_trades_to_minute_candles() {
    let mut writer = QueueWriter::new(0);
    let (_, mut cursor) = poll(&writer.bytes(), None, T0);

    let mut stored = Vec::new();
    let schedule = [(0, 10), (15_000, 12), (40_000, 8), (70_000, 9)];
    for (offset, price) in schedule {
        writer.push_match(true, 1_000_000_000, price * 1_000_000);
        let (trades, next) = poll(&writer.bytes(), Some(cursor), T0 + offset);
        cursor = next;
        stored.extend(trades);
    }

    // Stored records keep price and time through the compact codec
    let coder = Base64TradeCoder;
    let reloaded: Vec<Trade> = stored
        .iter()
        .map(|t| coder.decode(&coder.encode(t).unwrap()).unwrap())
        .collect();

    let res = Resolution::M1.millis();
    let (from, to) = snap_range(res, T0, T0 + 70_000).unwrap();
    let candles = aggregate_windows(&reloaded, res, from, to);

    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].open, 10.0);
    assert_eq!(candles[0].high, 12.0);
    assert_eq!(candles[0].close, 8.0);
    assert_eq!(candles[0].volume, 3.0);
    assert_eq!(candles[1].open, 9.0);
    assert!(candles.iter().all(|c| c.is_valid()));
}
