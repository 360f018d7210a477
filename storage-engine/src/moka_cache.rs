use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use shared::{Error, Result};
use songdo::clock::{Clock, SystemClock};
use songdo::domain::CacheStats;
use songdo::domain::response::{DeleteResponse, PutResponse};
use songdo::ports::CacheStore;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Timed<V> {
    value: V,
    ttl: Duration,
}

/// Expiry policy reading the TTL stored alongside each value
struct PerEntryTtl;

impl<V> Expiry<String, Timed<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Timed<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Timed<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Moka-based store with per-entry TTL
///
/// Moka never returns expired entries and reclaims them on its own, so
/// `stats().expired` only counts entries it has not yet swept.
pub struct MokaCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<String, Timed<V>>,
    clock: Arc<dyn Clock>,
}

impl<V> MokaCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a Moka store from name and optional capacity
    pub fn new(name: &str, max_entries: Option<u64>) -> Self {
        let mut builder = Cache::builder().name(name).expire_after(PerEntryTtl);

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Run moka's pending maintenance and report the entry count
    async fn settled_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[async_trait]
impl<V> CacheStore<V> for MokaCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V> {
        match self.cache.get(key).await {
            Some(timed) => Ok(timed.value),
            None => Err(Error::NotFound), // Either doesn't exist or TTL expired
        }
    }

    async fn put(&self, key: String, value: V, ttl: Duration) -> Result<PutResponse> {
        let created = !self.cache.contains_key(&key);
        let expires_at_ms = self
            .clock
            .now_ms()
            .saturating_add(ttl.as_millis() as u64);
        self.cache.insert(key, Timed { value, ttl }).await;
        Ok(PutResponse::new(created, expires_at_ms))
    }

    async fn delete(&self, key: &str) -> Result<DeleteResponse> {
        let existed = self.cache.remove(key).await.is_some();
        Ok(DeleteResponse::new(existed))
    }

    async fn clear(&self) -> Result<usize> {
        let removed = self.cache.iter().count();
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(removed)
    }

    async fn cleanup(&self) -> Result<usize> {
        let before = self.cache.entry_count();
        let after = self.settled_count().await;
        Ok(before.saturating_sub(after) as usize)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let total = self.settled_count().await as usize;
        let valid = self.cache.iter().count();
        let total = total.max(valid);
        Ok(CacheStats {
            total,
            expired: total - valid,
            valid,
        })
    }
}

impl<V> Debug for MokaCacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheStore")
            .field("name", &self.cache.name())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
