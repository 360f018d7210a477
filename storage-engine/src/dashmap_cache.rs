use async_trait::async_trait;
use dashmap::DashMap;
use shared::{Error, Result};
use songdo::clock::{Clock, SystemClock};
use songdo::domain::response::{DeleteResponse, PutResponse};
use songdo::domain::{CacheEntry, CacheStats};
use songdo::ports::CacheStore;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// DashMap-backed store with per-entry expiry
///
/// Expired entries stay in the map until read or swept by `cleanup`.
pub struct DashMapCacheStore<V> {
    name: String,
    entries: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V> DashMapCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl<V> CacheStore<V> for DashMapCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V> {
        let now = self.clock.now_ms();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(entry.data.clone());
            }
        }
        // Lazy eviction; the guard above must be released first
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Err(Error::NotFound)
    }

    async fn put(&self, key: String, value: V, ttl: Duration) -> Result<PutResponse> {
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl);
        let expires_at_ms = entry.expires_at_ms;
        let created = self.entries.insert(key, entry).is_none();
        Ok(PutResponse::new(created, expires_at_ms))
    }

    async fn delete(&self, key: &str) -> Result<DeleteResponse> {
        Ok(DeleteResponse::new(self.entries.remove(key).is_some()))
    }

    async fn clear(&self) -> Result<usize> {
        let removed = self.entries.len();
        self.entries.clear();
        Ok(removed)
    }

    async fn cleanup(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn stats(&self) -> Result<CacheStats> {
        let now = self.clock.now_ms();
        let mut stats = CacheStats::default();
        for entry in self.entries.iter() {
            stats.total += 1;
            if entry.is_expired(now) {
                stats.expired += 1;
            } else {
                stats.valid += 1;
            }
        }
        Ok(stats)
    }
}

impl<V> Debug for DashMapCacheStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashMapCacheStore")
            .field("name", &self.name)
            .field("entry_count", &self.entries.len())
            .finish()
    }
}
