// Bounded response cache for conditional requests.
// Maps endpoint strings to (headers, decoded body) with LRU-on-write eviction.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

/// Default number of cached responses.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// A cached response: its headers and the decoded JSON body.
/// `body` is `None` when the server returned an empty body.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl CacheEntry {
    /// Look up the entity tag, tolerating header-name case differences.
    pub fn etag(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("etag"))
            .map(|(_, value)| value.as_str())
    }
}

/// Least-recently-used cache over endpoint keys.
///
/// Only insertion and update move an entry to the most-recent position;
/// `get` never reorders. Eviction is capacity-driven, never time-based.
#[derive(Debug)]
pub struct ResponseCache {
    maxsize: usize,
    entries: HashMap<String, CacheEntry>,
    // Insertion/update order, least recent at the front.
    order: VecDeque<String>,
}

impl ResponseCache {
    pub fn new(maxsize: usize) -> Self {
        Self {
            maxsize,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace an entry, marking it most recently used,
    /// then evict the least recently used entries while over capacity.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        headers: HashMap<String, String>,
        body: Option<Value>,
    ) {
        let key = key.into();
        if self.entries.remove(&key).is_some() {
            self.order.retain(|k| *k != key);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, CacheEntry { headers, body });

        while self.entries.len() > self.maxsize {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}
