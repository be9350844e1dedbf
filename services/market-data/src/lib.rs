//! Market Data Core
//!
//! Turns raw event queue account bytes into trades, and trades into OHLCV
//! candles:
//! - Event queue header and record decoding (fixed little-endian layout)
//! - Ring buffer extraction of events newer than a sequence cursor
//! - Taker fill extraction with pluggable native → decimal conversion
//! - Dedup buffer for sources without sequence numbers
//! - Candle aggregation over fixed windows
//! - Compact base64 record codecs for string-valued stores
//! - Ingestion metrics
//!
//! Everything here is synchronous and free of I/O; the gateway drives it.
//!
//! # Architecture
//!
//! ```text
//!  Event queue bytes        Fill snapshots
//!        │                        │
//!   ┌────▼─────┐           ┌──────▼──────┐
//!   │ Ingest   │ ← cursor  │ OrderBuffer │ ← TTL dedup
//!   └────┬─────┘           └──────┬──────┘
//!        │                        │
//!   ┌────▼─────┐                  │
//!   │ Fills    │                  │
//!   └────┬─────┘                  │
//!        └──────────┬─────────────┘
//!                   │ Trade
//!              ┌────▼────┐
//!              │  Store  │ (persistence crate)
//!              └────┬────┘
//!                   │ ordered trades
//!              ┌────▼────┐
//!              │ Candles │
//!              └─────────┘
//! ```

pub mod candles;
pub mod codec;
pub mod events;
pub mod fills;
pub mod ingestion;
pub mod metrics;
pub mod order_buffer;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
