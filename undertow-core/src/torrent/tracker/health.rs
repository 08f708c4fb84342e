//! Shared tracker health records.

use std::sync::Arc;
use std::time::Duration;

use super::types::HealthRecord;
use crate::cache::{CacheStore, MemoryStore, StaleCache};

/// Keyed storage of the latest [`HealthRecord`] per tracker URL.
///
/// A record older than the store's TTL must be reported as absent.
pub trait HealthStore: Send + Sync {
    fn get(&self, url: &str) -> Option<HealthRecord>;

    /// Overwrites the record for `record.url`.
    fn set(&self, record: HealthRecord);

    fn evict(&self, url: &str);
}

/// Health records kept in process memory.
///
/// Stale records are never served: the stale window is zero, so a record is
/// either fresh or gone.
pub struct MemoryHealthStore {
    records: StaleCache<HealthRecord>,
}

impl MemoryHealthStore {
    /// Keeps at most `capacity` records, dropping the least recently used.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self::with_store(Arc::new(MemoryStore::with_capacity(capacity)), ttl)
    }

    /// Uses `store` as the backing storage.
    pub fn with_store(store: Arc<dyn CacheStore<HealthRecord>>, ttl: Duration) -> Self {
        Self {
            records: StaleCache::new(store, ttl, Duration::ZERO),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl HealthStore for MemoryHealthStore {
    fn get(&self, url: &str) -> Option<HealthRecord> {
        self.records.fresh(url)
    }

    fn set(&self, record: HealthRecord) {
        self.records.insert(record.url.clone(), record);
    }

    fn evict(&self, url: &str) {
        self.records.evict(url);
    }
}
