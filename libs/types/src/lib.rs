//! Types library for the trade history service
//!
//! Core type definitions shared by the ingestion core, the storage
//! backends and the HTTP gateway.
//!
//! # Modules
//! - `ids`: Identifiers (MarketId, FillId)
//! - `trade`: Canonical trade records and taker side
//! - `candle`: OHLCV candles derived from trades
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod trade;
pub mod candle;
pub mod errors;
