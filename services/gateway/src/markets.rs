//! Market registry
//!
//! The configured market list, loaded once at startup from a JSON file:
//!
//! ```json
//! [
//!   { "name": "SOL/USDC", "address": "9wFF...", "eventQueue": "5KKs...",
//!     "baseDecimals": 9, "quoteDecimals": 6, "priceScale": 1000 }
//! ]
//! ```
//!
//! `eventQueue` and `fillsUrl` are both optional: a market with neither is
//! served from storage but never collected.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use market_data::fills::NativeScale;
use serde::{Deserialize, Serialize};
use types::ids::MarketId;

/// Price scale reported for markets that do not configure one.
pub const DEFAULT_PRICE_SCALE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketConfig {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub event_queue: Option<String>,
    /// Snapshot endpoint listing currently visible fills.
    #[serde(default)]
    pub fills_url: Option<String>,
    pub base_decimals: u32,
    pub quote_decimals: u32,
    #[serde(default)]
    pub price_scale: Option<u32>,
}

impl MarketConfig {
    pub fn price_scale(&self) -> u32 {
        self.price_scale.unwrap_or(DEFAULT_PRICE_SCALE)
    }

    pub fn native_scale(&self) -> Option<NativeScale> {
        NativeScale::from_decimals(self.base_decimals, self.quote_decimals)
    }
}

/// A configured market with its storage id resolved.
#[derive(Debug, Clone)]
pub struct Market {
    pub id: MarketId,
    pub config: MarketConfig,
}

/// Lookup by display name and by on-chain address.
#[derive(Debug, Default)]
pub struct MarketRegistry {
    markets: Vec<Arc<Market>>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<String, usize>,
}

impl MarketRegistry {
    pub fn new(configs: Vec<MarketConfig>) -> anyhow::Result<Self> {
        let mut registry = Self::default();
        for config in configs {
            let Some(id) = MarketId::try_new(config.name.clone()) else {
                bail!("invalid market name {:?}", config.name);
            };
            if config.native_scale().is_none() {
                bail!("market {}: token decimals out of range", config.name);
            }
            let index = registry.markets.len();
            if registry.by_name.insert(config.name.clone(), index).is_some() {
                bail!("duplicate market name {}", config.name);
            }
            if registry.by_address.insert(config.address.clone(), index).is_some() {
                bail!("duplicate market address {}", config.address);
            }
            registry.markets.push(Arc::new(Market { id, config }));
        }
        Ok(registry)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let configs: Vec<MarketConfig> =
            serde_json::from_str(json).context("parsing market list")?;
        Self::new(configs)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading market list {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<Market>> {
        self.by_name.get(name).map(|&i| &self.markets[i])
    }

    pub fn by_address(&self, address: &str) -> Option<&Arc<Market>> {
        self.by_address.get(address).map(|&i| &self.markets[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Market>> {
        self.markets.iter()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}
