//! Trade History Gateway
//!
//! The running process: collects fills per market into the trade store and
//! serves candle history and recent trades over HTTP.
//!
//! ```text
//!  RPC ──► EventQueueCollector ─┐
//!                               ├──► TradeStore ──► HistoryService ──► axum routes
//!  HTTP ─► SnapshotCollector ───┘
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod handlers;
pub mod history;
pub mod markets;
pub mod models;
pub mod notify;
pub mod router;
pub mod rpc;
pub mod state;
