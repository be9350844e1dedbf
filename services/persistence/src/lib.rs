//! Trade Persistence
//!
//! Time-bucketed trade storage behind a single capability trait, with
//! backends selected by configuration:
//! - `memory`: day-bucket lists in process memory
//! - `journal`: day-bucket lists in CRC32C-framed append-only files
//! - `sqlite`: one row per trade, range queries over a bounded r2d2 pool
//!
//! Every backend also keeps durable scalars (the ingestion cursor) and
//! delivers trades in chronological order, which candle aggregation
//! depends on.

pub mod bucket;
pub mod cache;
pub mod config;
pub mod error;
pub mod journal;
pub mod list;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use config::{open_store, BackendKind, StoreConfig};
pub use error::StoreError;
pub use store::{TradeStore, CURSOR_KEY};
