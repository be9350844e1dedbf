//! In-memory list backend
//!
//! Process-local and lost on restart. Used for development, query-only
//! tests and as the default when no durable backend is configured.

use dashmap::DashMap;

use crate::error::StoreError;
use crate::list::ListBackend;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    lists: DashMap<String, Vec<String>>,
    values: DashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of list keys currently held.
    pub fn list_count(&self) -> usize {
        self.lists.len()
    }
}

impl ListBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lists
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lists
            .get(key)
            .map(|list| list.value().clone())
            .unwrap_or_default())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }
}
