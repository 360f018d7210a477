use crate::cache_key::CacheKey;
use crate::domain::{CacheStats, TtlPolicy};
use crate::ports::CacheStore;
use shared::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Value returned by a cached call, with whether it came from the cache
#[derive(Clone, Debug, PartialEq)]
pub struct Lookup<V> {
    pub value: V,
    pub hit: bool,
}

/// Application service in front of a `CacheStore`
///
/// The cache is advisory: storage failures are logged and never fail the caller.
pub struct ResponseCache<V> {
    store: Arc<dyn CacheStore<V>>,
    policy: TtlPolicy,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn CacheStore<V>>, policy: TtlPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        match self.store.get(key.as_str()).await {
            Ok(value) => Some(value),
            Err(Error::NotFound) => None,
            Err(e) => {
                warn!("Cache read failed for '{}': {}", key, e);
                None
            }
        }
    }

    /// Store `value`; without an explicit `ttl` the endpoint's policy TTL applies
    pub async fn set(&self, key: &CacheKey, value: V, ttl: Option<Duration>) -> Result<()> {
        let ttl = ttl.unwrap_or_else(|| self.policy.ttl_for(key.endpoint()));
        self.store.put(key.to_string(), value, ttl).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.store.delete(key.as_str()).await?.deleted)
    }

    pub async fn clear(&self) -> Result<usize> {
        self.store.clear().await
    }

    pub async fn cleanup(&self) -> Result<usize> {
        self.store.cleanup().await
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.store.stats().await
    }

    /// Return the cached value for `key`, or run `fetcher` and cache its success
    pub async fn with_cache<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Option<Duration>,
        fetcher: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        self.with_cache_lookup(key, ttl, fetcher)
            .await
            .map(|lookup| lookup.value)
    }

    /// Like `with_cache`, also reporting whether the value was a cache hit
    ///
    /// Concurrent misses on the same key each invoke their own fetcher.
    pub async fn with_cache_lookup<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Option<Duration>,
        fetcher: F,
    ) -> std::result::Result<Lookup<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            debug!("Cache hit: {}", key);
            return Ok(Lookup { value, hit: true });
        }

        debug!("Cache miss: {}", key);
        let value = fetcher().await?;

        if let Err(e) = self.set(key, value.clone(), ttl).await {
            warn!("Cache write failed for '{}': {}", key, e);
        }

        Ok(Lookup { value, hit: false })
    }
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::domain::response::{DeleteResponse, PutResponse};
    use crate::domain::{CacheEntry, Endpoint};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapStore {
        entries: Mutex<HashMap<String, CacheEntry<String>>>,
        clock: Arc<ManualClock>,
        fail_writes: bool,
    }

    impl MapStore {
        fn new(clock: Arc<ManualClock>) -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                clock,
                fail_writes: false,
            }
        }
    }

    #[async_trait]
    impl CacheStore<String> for MapStore {
        async fn get(&self, key: &str) -> Result<String> {
            let now = self.clock.now_ms();
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => Ok(entry.data.clone()),
                Some(_) => {
                    entries.remove(key);
                    Err(Error::NotFound)
                }
                None => Err(Error::NotFound),
            }
        }

        async fn put(&self, key: String, value: String, ttl: Duration) -> Result<PutResponse> {
            if self.fail_writes {
                return Err(Error::Internal("disk on fire".into()));
            }
            let entry = CacheEntry::new(value, self.clock.now_ms(), ttl);
            let expires = entry.expires_at_ms;
            let created = self.entries.lock().insert(key, entry).is_none();
            Ok(PutResponse::new(created, expires))
        }

        async fn delete(&self, key: &str) -> Result<DeleteResponse> {
            Ok(DeleteResponse::new(self.entries.lock().remove(key).is_some()))
        }

        async fn clear(&self) -> Result<usize> {
            let mut entries = self.entries.lock();
            let n = entries.len();
            entries.clear();
            Ok(n)
        }

        async fn cleanup(&self) -> Result<usize> {
            let now = self.clock.now_ms();
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|_, e| !e.is_expired(now));
            Ok(before - entries.len())
        }

        async fn stats(&self) -> Result<CacheStats> {
            let now = self.clock.now_ms();
            let entries = self.entries.lock();
            let expired = entries.values().filter(|e| e.is_expired(now)).count();
            Ok(CacheStats {
                total: entries.len(),
                expired,
                valid: entries.len() - expired,
            })
        }
    }

    fn cache_with_clock() -> (ResponseCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = Arc::new(MapStore::new(clock.clone()));
        (ResponseCache::new(store, TtlPolicy::new()), clock)
    }

    #[tokio::test]
    async fn test_set_then_get_until_ttl_elapses() {
        let (cache, clock) = cache_with_clock();
        let key = CacheKey::new(Endpoint::News);

        cache
            .set(&key, "headlines".to_string(), Some(Duration::from_secs(120)))
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await.as_deref(), Some("headlines"));

        clock.advance(Duration::from_secs(119));
        assert!(cache.get(&key).await.is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_policy_ttl_is_used_when_none_given() {
        let (cache, clock) = cache_with_clock();
        let key = CacheKey::with_params(Endpoint::Subway, [("station", Some("Incheon"))]);

        cache.set(&key, "timetable".to_string(), None).await.unwrap();

        clock.advance(Duration::from_secs(59));
        assert!(cache.get(&key).await.is_some());
        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_with_cache_fetches_once_then_hits() {
        let (cache, _clock) = cache_with_clock();
        let key = CacheKey::new(Endpoint::Weather);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..3 {
            let value = cache
                .with_cache(&key, None, move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Error>("sunny".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "sunny");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_cache_refetches_after_expiry() {
        let (cache, clock) = cache_with_clock();
        let key = CacheKey::new(Endpoint::Weather);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>("cloudy".to_string())
        };

        let first = cache.with_cache_lookup(&key, None, fetch).await.unwrap();
        assert!(!first.hit);

        let second = cache.with_cache_lookup(&key, None, fetch).await.unwrap();
        assert!(second.hit);

        clock.advance(Duration::from_secs(10 * 60));
        let third = cache.with_cache_lookup(&key, None, fetch).await.unwrap();
        assert!(!third.hit);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_cache_does_not_cache_errors() {
        let (cache, _clock) = cache_with_clock();
        let key = CacheKey::new(Endpoint::Medical);

        let err = cache
            .with_cache(&key, None, || async {
                Err::<String, _>(Error::Upstream("503 from upstream".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(cache.get(&key).await.is_none());

        let value = cache
            .with_cache(&key, None, || async { Ok::<_, Error>("clinics".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "clinics");
    }

    #[tokio::test]
    async fn test_write_failure_still_returns_fetched_value() {
        let clock = Arc::new(ManualClock::new(0));
        let mut store = MapStore::new(clock);
        store.fail_writes = true;
        let cache = ResponseCache::new(Arc::new(store), TtlPolicy::new());
        let key = CacheKey::new(Endpoint::Guides);

        let value = cache
            .with_cache(&key, None, || async { Ok::<_, Error>("guide".to_string()) })
            .await
            .unwrap();

        assert_eq!(value, "guide");
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_clear_cleanup_and_stats() {
        let (cache, clock) = cache_with_clock();
        let short = CacheKey::new(Endpoint::Subway);
        let long = CacheKey::new(Endpoint::Guides);
        let other = CacheKey::new(Endpoint::News);

        cache.set(&short, "a".into(), None).await.unwrap();
        cache.set(&long, "b".into(), None).await.unwrap();
        cache.set(&other, "c".into(), None).await.unwrap();

        assert!(cache.delete(&other).await.unwrap());
        assert!(!cache.delete(&other).await.unwrap());

        clock.advance(Duration::from_secs(120));
        let stats = cache.stats().await.unwrap();
        assert_eq!(
            stats,
            CacheStats {
                total: 2,
                expired: 1,
                valid: 1
            }
        );

        assert_eq!(cache.cleanup().await.unwrap(), 1);
        assert_eq!(cache.stats().await.unwrap().total, 1);

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert_eq!(cache.stats().await.unwrap(), CacheStats::default());
    }
}
