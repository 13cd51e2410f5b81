//! Response cache for GET requests.
//!
//! The client stores decoded JSON bodies of successful GET responses under a
//! deterministic key and serves them back until the entry's TTL elapses.
//! [`MemoryCache`] is the default store; anything implementing [`CacheStore`]
//! (a Redis wrapper, a disk cache) can be plugged in through the builder.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Trait for cache store implementations.
pub trait CacheStore: Send + Sync {
    /// Whether a live entry exists for the key.
    fn has(&self, key: &str) -> bool;

    /// Get a cached value by key. Returns `None` for missing or expired
    /// entries.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a value under the key for the given TTL.
    fn put(&self, key: &str, value: Value, ttl: Duration);
}

/// Build the cache key for a request.
///
/// The key is a pure function of request identity: two calls with the same
/// method, endpoint and effective parameters (after language/region
/// defaulting) always produce the same key. Parameters are hashed in
/// `BTreeMap` order, so insertion order never leaks into the key.
pub fn cache_key(
    prefix: &str,
    method: &str,
    endpoint: &str,
    params: &BTreeMap<String, String>,
    body: Option<&Value>,
) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in params {
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update(value.as_bytes());
        hasher.update([0]);
    }
    if let Some(body) = body {
        hasher.update(body.to_string().as_bytes());
    }
    let digest = hasher.finalize();

    format!(
        "{}:{}:{}:{}",
        prefix,
        method,
        endpoint.trim_matches('/').replace('/', "_"),
        hex::encode(&digest[..8])
    )
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-memory cache store with TTL expiry and O(1) FIFO eviction.
pub struct MemoryCache {
    store: Arc<RwLock<HashMap<String, Entry>>>,
    order: Arc<RwLock<VecDeque<String>>>,
    max_entries: usize,
}

impl MemoryCache {
    /// Create a new memory cache holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::with_capacity(max_entries))),
            order: Arc::new(RwLock::new(VecDeque::with_capacity(max_entries))),
            max_entries,
        }
    }

    /// Get the current number of entries, expired ones included.
    pub fn size(&self) -> usize {
        self.store.read().unwrap().len()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        let mut store = self.store.write().unwrap();
        let mut order = self.order.write().unwrap();
        store.clear();
        order.clear();
    }
}

impl CacheStore for MemoryCache {
    fn has(&self, key: &str) -> bool {
        self.store
            .read()
            .unwrap()
            .get(key)
            .is_some_and(Entry::is_live)
    }

    fn get(&self, key: &str) -> Option<Value> {
        let store = self.store.read().unwrap();
        let entry = store.get(key)?;

        if !entry.is_live() {
            // Left in place; overwritten on the next put or evicted FIFO.
            return None;
        }

        Some(entry.value.clone())
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        let mut store = self.store.write().unwrap();
        let mut order = self.order.write().unwrap();

        // Evict oldest if at capacity (O(1) with VecDeque)
        while !store.contains_key(key) && store.len() >= self.max_entries {
            if let Some(oldest) = order.pop_front() {
                store.remove(&oldest);
            } else {
                break;
            }
        }

        if !store.contains_key(key) {
            order.push_back(key.to_string());
        }

        store.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(100)
    }
}
