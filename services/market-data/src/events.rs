//! Event queue account layout
//!
//! Fixed-offset description of the exchange's on-chain event queue: a
//! header followed by a circular array of fixed-width fill/out records.
//! Capacity is not stored; it is derived from the account length.
//!
//! # Binary Format (layout version 3, little-endian)
//! ```text
//! Header (37 bytes)
//! [0..5]    blob, ignored
//! [5..13]   account_flags: u64 bitfield
//! [13..17]  head: u32
//! [17..21]  zero padding
//! [21..25]  count: u32
//! [25..29]  zero padding
//! [29..33]  seq_num: u32
//! [33..37]  zero padding
//!
//! Event record (88 bytes)
//! [0]       event_flags: u8 (bit0 fill, bit1 out, bit2 bid, bit3 maker)
//! [1]       open_orders_slot: u8
//! [2]       fee_tier: u8
//! [3..8]    blob, ignored
//! [8..16]   native_quantity_released: u64
//! [16..24]  native_quantity_paid: u64
//! [24..32]  native_fee_or_rebate: u64
//! [32..48]  order_id: u128
//! [48..80]  open_orders: [u8; 32]
//! [80..88]  client_order_id: u64
//! ```

use serde::{Deserialize, Serialize};

/// Size of the event queue header in bytes.
pub const HEADER_SIZE: usize = 37;

/// Size of one event record in bytes.
pub const EVENT_SIZE: usize = 88;

// ── Header field offsets ────────────────────────────────────────────

const ACCOUNT_FLAGS_OFFSET: usize = 5;
const HEAD_OFFSET: usize = 13;
const COUNT_OFFSET: usize = 21;
const SEQ_NUM_OFFSET: usize = 29;
const HEADER_PADDING: [(usize, usize); 3] = [(17, 21), (25, 29), (33, 37)];

// ── Event field offsets ─────────────────────────────────────────────

const FLAGS_OFFSET: usize = 0;
const OPEN_ORDERS_SLOT_OFFSET: usize = 1;
const FEE_TIER_OFFSET: usize = 2;
const RELEASED_OFFSET: usize = 8;
const PAID_OFFSET: usize = 16;
const FEE_OFFSET: usize = 24;
const ORDER_ID_OFFSET: usize = 32;
const OPEN_ORDERS_OFFSET: usize = 48;
const CLIENT_ORDER_ID_OFFSET: usize = 80;

// ── Errors ──────────────────────────────────────────────────────────

/// Errors raised while decoding event queue bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("buffer too short: need {needed} bytes, have {actual}")]
    BufferTooShort { needed: usize, actual: usize },

    #[error("nonzero padding bytes at offset {offset}")]
    NonzeroPadding { offset: usize },

    #[error("account flags {0:#x} do not describe an initialized event queue")]
    NotAnEventQueue(u64),

    #[error("event queue of {len} bytes has no room for a single event")]
    NoCapacity { len: usize },
}

// ── Little-endian readers ───────────────────────────────────────────

fn ensure_len(buf: &[u8], needed: usize) -> Result<(), DecodeError> {
    if buf.len() < needed {
        return Err(DecodeError::BufferTooShort {
            needed,
            actual: buf.len(),
        });
    }
    Ok(())
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn read_u128(buf: &[u8], offset: usize) -> u128 {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&buf[offset..offset + 16]);
    u128::from_le_bytes(bytes)
}

// ── Account flags ───────────────────────────────────────────────────

/// Account-type bitfield shared by all exchange accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountFlags(u64);

impl AccountFlags {
    pub const INITIALIZED: u64 = 1 << 0;
    pub const MARKET: u64 = 1 << 1;
    pub const OPEN_ORDERS: u64 = 1 << 2;
    pub const REQUEST_QUEUE: u64 = 1 << 3;
    pub const EVENT_QUEUE: u64 = 1 << 4;
    pub const BIDS: u64 = 1 << 5;
    pub const ASKS: u64 = 1 << 6;

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Flags of an initialized event queue account.
    pub fn event_queue() -> Self {
        Self(Self::INITIALIZED | Self::EVENT_QUEUE)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn is_initialized(&self) -> bool {
        self.0 & Self::INITIALIZED != 0
    }

    pub fn is_event_queue(&self) -> bool {
        self.0 & Self::EVENT_QUEUE != 0
    }
}

// ── Header ──────────────────────────────────────────────────────────

/// Event queue header: ring position and the producer's sequence counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQueueHeader {
    pub account_flags: AccountFlags,
    /// Slot index of the oldest unconsumed event
    pub head: u32,
    /// Number of unconsumed events
    pub count: u32,
    /// Monotonic count of events ever pushed (wraps at u32::MAX)
    pub seq_num: u32,
}

impl EventQueueHeader {
    /// Decode the header at the start of an event queue account.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, HEADER_SIZE)?;

        for (start, end) in HEADER_PADDING {
            if let Some(pos) = buf[start..end].iter().position(|b| *b != 0) {
                return Err(DecodeError::NonzeroPadding { offset: start + pos });
            }
        }

        let account_flags = AccountFlags::from_bits(read_u64(buf, ACCOUNT_FLAGS_OFFSET));
        if !(account_flags.is_initialized() && account_flags.is_event_queue()) {
            return Err(DecodeError::NotAnEventQueue(account_flags.bits()));
        }

        Ok(Self {
            account_flags,
            head: read_u32(buf, HEAD_OFFSET),
            count: read_u32(buf, COUNT_OFFSET),
            seq_num: read_u32(buf, SEQ_NUM_OFFSET),
        })
    }

    /// Serialize the header to its binary layout.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..5].copy_from_slice(b"serum");
        buf[ACCOUNT_FLAGS_OFFSET..ACCOUNT_FLAGS_OFFSET + 8]
            .copy_from_slice(&self.account_flags.bits().to_le_bytes());
        buf[HEAD_OFFSET..HEAD_OFFSET + 4].copy_from_slice(&self.head.to_le_bytes());
        buf[COUNT_OFFSET..COUNT_OFFSET + 4].copy_from_slice(&self.count.to_le_bytes());
        buf[SEQ_NUM_OFFSET..SEQ_NUM_OFFSET + 4].copy_from_slice(&self.seq_num.to_le_bytes());
        buf
    }
}

// ── Event record ────────────────────────────────────────────────────

/// Per-event flag byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventFlags {
    pub fill: bool,
    pub out: bool,
    pub bid: bool,
    pub maker: bool,
}

impl EventFlags {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            fill: byte & 0b0001 != 0,
            out: byte & 0b0010 != 0,
            bid: byte & 0b0100 != 0,
            maker: byte & 0b1000 != 0,
        }
    }

    pub fn to_byte(&self) -> u8 {
        (self.fill as u8) | (self.out as u8) << 1 | (self.bid as u8) << 2 | (self.maker as u8) << 3
    }
}

/// One slot of the event queue ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub flags: EventFlags,
    pub open_orders_slot: u8,
    pub fee_tier: u8,
    /// Amount the owner received, native units
    pub native_quantity_released: u64,
    /// Amount the owner paid, native units
    pub native_quantity_paid: u64,
    pub native_fee_or_rebate: u64,
    pub order_id: u128,
    pub open_orders: [u8; 32],
    pub client_order_id: u64,
}

impl EventRecord {
    /// Decode the record starting at `offset`.
    pub fn decode(buf: &[u8], offset: usize) -> Result<Self, DecodeError> {
        ensure_len(buf, offset + EVENT_SIZE)?;
        let rec = &buf[offset..offset + EVENT_SIZE];

        let mut open_orders = [0u8; 32];
        open_orders.copy_from_slice(&rec[OPEN_ORDERS_OFFSET..OPEN_ORDERS_OFFSET + 32]);

        Ok(Self {
            flags: EventFlags::from_byte(rec[FLAGS_OFFSET]),
            open_orders_slot: rec[OPEN_ORDERS_SLOT_OFFSET],
            fee_tier: rec[FEE_TIER_OFFSET],
            native_quantity_released: read_u64(rec, RELEASED_OFFSET),
            native_quantity_paid: read_u64(rec, PAID_OFFSET),
            native_fee_or_rebate: read_u64(rec, FEE_OFFSET),
            order_id: read_u128(rec, ORDER_ID_OFFSET),
            open_orders,
            client_order_id: read_u64(rec, CLIENT_ORDER_ID_OFFSET),
        })
    }

    /// Serialize the record to its binary layout.
    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let mut buf = [0u8; EVENT_SIZE];
        buf[FLAGS_OFFSET] = self.flags.to_byte();
        buf[OPEN_ORDERS_SLOT_OFFSET] = self.open_orders_slot;
        buf[FEE_TIER_OFFSET] = self.fee_tier;
        buf[RELEASED_OFFSET..RELEASED_OFFSET + 8]
            .copy_from_slice(&self.native_quantity_released.to_le_bytes());
        buf[PAID_OFFSET..PAID_OFFSET + 8].copy_from_slice(&self.native_quantity_paid.to_le_bytes());
        buf[FEE_OFFSET..FEE_OFFSET + 8].copy_from_slice(&self.native_fee_or_rebate.to_le_bytes());
        buf[ORDER_ID_OFFSET..ORDER_ID_OFFSET + 16].copy_from_slice(&self.order_id.to_le_bytes());
        buf[OPEN_ORDERS_OFFSET..OPEN_ORDERS_OFFSET + 32].copy_from_slice(&self.open_orders);
        buf[CLIENT_ORDER_ID_OFFSET..CLIENT_ORDER_ID_OFFSET + 8]
            .copy_from_slice(&self.client_order_id.to_le_bytes());
        buf
    }

    /// Fill seen from the taker's side. Maker records mirror the same trade.
    pub fn is_taker_fill(&self) -> bool {
        self.flags.fill && !self.flags.maker
    }
}
