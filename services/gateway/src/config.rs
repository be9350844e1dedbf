//! Process configuration from environment variables
//!
//! Environment variables (a `.env` file is loaded first when present):
//! - `PORT` (default: 5000)
//! - `RPC_ENDPOINT_URL` (default: https://api.mainnet-beta.solana.com)
//! - `INTERVAL` poll interval in seconds (default: 30)
//! - `ROLE` set to `web` to run without collectors
//! - `WEBHOOK_URL` failure notifications target (default: log only)
//! - `STORE_BACKEND` memory | journal | sqlite (default: memory)
//! - `STORE_PATH` (default: ./data)
//! - `STORE_POOL_SIZE` (default: 8)
//! - `BUCKET_CACHE_SIZE` (default: 500)
//! - `MARKETS_FILE` (default: markets.json)
//! - `MAX_CANDLES` (default: 10000)
//! - `RECENT_TRADES_LIMIT` (default: 50)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use persistence::{BackendKind, StoreConfig};

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub rpc_url: String,
    pub interval: Duration,
    /// Query-only process: no collectors are started.
    pub web_only: bool,
    pub webhook_url: Option<String>,
    pub store: StoreConfig,
    pub markets_file: PathBuf,
    pub max_candles: i64,
    pub recent_trades_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let interval_secs: u64 = parse_or(&var, "INTERVAL", 30)?;
        if interval_secs == 0 {
            bail!("INTERVAL must be at least 1 second");
        }
        let max_candles: i64 = parse_or(&var, "MAX_CANDLES", 10_000)?;
        if max_candles <= 0 {
            bail!("MAX_CANDLES must be positive");
        }

        let backend = match var("STORE_BACKEND") {
            Some(raw) => raw
                .parse::<BackendKind>()
                .with_context(|| format!("invalid STORE_BACKEND {:?}", raw))?,
            None => BackendKind::Memory,
        };

        Ok(Self {
            port: parse_or(&var, "PORT", 5000)?,
            rpc_url: var("RPC_ENDPOINT_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            interval: Duration::from_secs(interval_secs),
            web_only: var("ROLE").is_some_and(|r| r.trim().eq_ignore_ascii_case("web")),
            webhook_url: var("WEBHOOK_URL"),
            store: StoreConfig {
                backend,
                path: var("STORE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data")),
                pool_size: parse_or(&var, "STORE_POOL_SIZE", 8)?,
                cache_size: parse_or(&var, "BUCKET_CACHE_SIZE", 500)?,
            },
            markets_file: var("MARKETS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("markets.json")),
            max_candles,
            recent_trades_limit: parse_or(&var, "RECENT_TRADES_LIMIT", 50)?,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {} {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Load `.env` from the working directory or any of its ancestors.
///
/// Returns the file that was loaded, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}
