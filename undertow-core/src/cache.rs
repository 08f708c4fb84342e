//! TTL cache stores with a stale-serving grace window.
//!
//! Components never own a map directly. They hold a [`StaleCache`] over an
//! injected [`CacheStore`], so the backing store can be swapped (sharded map,
//! external cache) without touching component logic.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Cached payload together with the moment it was stored and its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// When the entry was stored
    pub created_at: Instant,
    /// Freshness lifetime
    pub ttl: Duration,
    /// Cached value
    pub payload: V,
}

impl<V> CacheEntry<V> {
    /// Creates an entry stamped with the current time.
    pub fn new(payload: V, ttl: Duration) -> Self {
        Self {
            created_at: Instant::now(),
            ttl,
            payload,
        }
    }

    /// Time elapsed since the entry was stored.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Raw keyed storage for cache entries.
///
/// Implementations must be safe for concurrent use; no ordering guarantees
/// are required beyond atomic per-key operations.
pub trait CacheStore<V>: Send + Sync {
    /// Returns a copy of the entry stored under `key`.
    fn get(&self, key: &str) -> Option<CacheEntry<V>>;

    /// Stores `entry` under `key`, replacing any previous entry.
    fn set(&self, key: String, entry: CacheEntry<V>);

    /// Removes the entry stored under `key`.
    fn evict(&self, key: &str);

    /// Number of stored entries, expired ones included.
    fn len(&self) -> usize;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store with least-recently-used eviction.
pub struct MemoryStore<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
}

impl<V> MemoryStore<V> {
    /// Creates a store holding at most `capacity` entries (minimum one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Creates a store without a size bound.
    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
        }
    }
}

impl<V: Clone + Send> CacheStore<V> for MemoryStore<V> {
    fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: String, entry: CacheEntry<V>) {
        self.entries.lock().put(key, entry);
    }

    fn evict(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// How a cache hit relates to its TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Age is within the TTL
    Fresh,
    /// Past the TTL but still inside the stale window
    Stale,
}

/// TTL policy over a [`CacheStore`].
///
/// An entry is fresh until `ttl`, served as stale until `ttl + stale_window`,
/// and evicted on the first lookup after that.
pub struct StaleCache<V> {
    store: Arc<dyn CacheStore<V>>,
    ttl: Duration,
    stale_window: Duration,
}

impl<V: Clone> StaleCache<V> {
    /// Creates a cache policy over `store`.
    pub fn new(store: Arc<dyn CacheStore<V>>, ttl: Duration, stale_window: Duration) -> Self {
        Self {
            store,
            ttl,
            stale_window,
        }
    }

    /// Looks up `key`, dropping it if it has outlived the stale window.
    pub fn lookup(&self, key: &str) -> Option<(V, Freshness)> {
        let entry = self.store.get(key)?;
        let age = entry.age();

        if age <= entry.ttl {
            Some((entry.payload, Freshness::Fresh))
        } else if age <= entry.ttl + self.stale_window {
            Some((entry.payload, Freshness::Stale))
        } else {
            self.store.evict(key);
            None
        }
    }

    /// Returns the payload only while it is fresh.
    pub fn fresh(&self, key: &str) -> Option<V> {
        match self.lookup(key) {
            Some((payload, Freshness::Fresh)) => Some(payload),
            _ => None,
        }
    }

    /// Stores `payload` under `key` with the configured TTL.
    pub fn insert(&self, key: impl Into<String>, payload: V) {
        self.store
            .set(key.into(), CacheEntry::new(payload, self.ttl));
    }

    /// Removes `key` regardless of its age.
    pub fn evict(&self, key: &str) {
        self.store.evict(key);
    }

    /// Configured freshness lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
