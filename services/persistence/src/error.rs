//! Storage errors shared by every backend.

use market_data::codec::CodecError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Record codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Corrupted record in {key} at byte offset {offset}: {detail}")]
    Corrupted {
        key: String,
        offset: u64,
        detail: String,
    },

    #[error("Invalid stored value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Timestamp {0} cannot be mapped to a calendar day")]
    InvalidTimestamp(i64),

    #[error("Unknown store backend: {0}")]
    UnknownBackend(String),
}
