//! Backend selection
//!
//! The backend is chosen by configuration at startup; callers only ever
//! see `Arc<dyn TradeStore>`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::journal::{JournalBackend, JournalConfig};
use crate::list::DayBucketStore;
use crate::memory::MemoryBackend;
use crate::sqlite::SqliteStore;
use crate::store::TradeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Day-bucket lists in process memory
    Memory,
    /// Day-bucket lists in checksummed append-only files
    Journal,
    /// Rows in a SQLite database
    Sqlite,
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "journal" => Ok(BackendKind::Journal),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(StoreError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Memory => "memory",
            BackendKind::Journal => "journal",
            BackendKind::Sqlite => "sqlite",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Journal directory, or the SQLite database directory
    pub path: PathBuf,
    /// Max pooled SQLite connections
    pub pool_size: u32,
    /// Closed day buckets kept decoded in memory (list backends)
    pub cache_size: usize,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            path: PathBuf::from("./data"),
            pool_size: 8,
            cache_size: 500,
        }
    }
}

/// Database file used by the SQLite backend inside `path`.
pub const SQLITE_FILE: &str = "trades.db";

pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn TradeStore>, StoreError> {
    let store: Arc<dyn TradeStore> = match config.backend {
        BackendKind::Memory => Arc::new(DayBucketStore::new(MemoryBackend::new(), config.cache_size)),
        BackendKind::Journal => {
            let backend = JournalBackend::open(JournalConfig::new(&config.path))?;
            Arc::new(DayBucketStore::new(backend, config.cache_size))
        }
        BackendKind::Sqlite => {
            std::fs::create_dir_all(&config.path)?;
            Arc::new(SqliteStore::open(
                &config.path.join(SQLITE_FILE),
                config.pool_size,
            )?)
        }
    };
    info!(
        backend = %config.backend,
        path = %config.path.display(),
        "Trade store opened"
    );
    Ok(store)
}
