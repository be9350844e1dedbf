//! LRU cache of decoded day buckets
//!
//! Holds the decoded trades of day buckets that have fully elapsed, so
//! repeated history queries over old days skip the backend read and the
//! record decoding. The cache is explicitly sized; the least recently used
//! bucket is evicted first.
//!
//! A reader that decoded a bucket may only cache it if no write touched
//! that key in the meantime. Writes bump a generation counter for the key;
//! [`BucketCache::insert`] drops a snapshot taken under an older
//! generation. Counters are striped over a fixed table, so a write to a
//! key sharing the stripe only costs one skipped insert.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use types::trade::Trade;

const GENERATION_STRIPES: usize = 64;

struct Inner {
    entries: HashMap<String, Arc<Vec<Trade>>>,
    /// Keys from least to most recently used
    order: VecDeque<String>,
    generations: [u64; GENERATION_STRIPES],
}

fn stripe(key: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % GENERATION_STRIPES as u64) as usize
}

pub struct BucketCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl BucketCache {
    /// A cache of `capacity` buckets. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                generations: [0; GENERATION_STRIPES],
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<Trade>>> {
        let mut inner = self.inner.lock().ok()?;
        let trades = inner.entries.get(key).cloned()?;
        touch(&mut inner.order, key);
        Some(trades)
    }

    /// Write generation of `key`; read it before loading the bucket.
    pub fn generation(&self, key: &str) -> u64 {
        self.inner
            .lock()
            .map(|i| i.generations[stripe(key)])
            .unwrap_or(0)
    }

    /// Cache `trades` for `key` unless a write happened since `generation`.
    /// Returns whether the bucket was cached.
    pub fn insert(&self, key: String, trades: Arc<Vec<Trade>>, generation: u64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.generations[stripe(&key)] != generation {
            return false;
        }
        if inner.entries.insert(key.clone(), trades).is_some() {
            touch(&mut inner.order, &key);
            return true;
        }
        inner.order.push_back(key);
        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(evicted) => {
                    inner.entries.remove(&evicted);
                }
                None => break,
            }
        }
        true
    }

    /// Drop `key` and bump its generation. Call after every write to it.
    pub fn invalidate(&self, key: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            let slot = stripe(key);
            inner.generations[slot] = inner.generations[slot].wrapping_add(1);
            if inner.entries.remove(key).is_some() {
                inner.order.retain(|k| k != key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn touch(order: &mut VecDeque<String>, key: &str) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}
