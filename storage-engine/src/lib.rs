pub mod dashmap_cache;
pub mod moka_cache;
pub mod snapshot_store;

pub use dashmap_cache::DashMapCacheStore;
pub use moka_cache::MokaCacheStore;
pub use snapshot_store::JsonSnapshotRepository;

use shared::config::CacheBackend;
use songdo::clock::{Clock, SystemClock};
use songdo::domain::StoreConfig;
use songdo::ports::{CacheStore, StorageFactory};
use std::sync::Arc;
use tracing::info;

/// Builds a cache store for whichever backend the config names
pub struct UnifiedStorageFactory {
    clock: Arc<dyn Clock>,
}

impl UnifiedStorageFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for UnifiedStorageFactory {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl<V> StorageFactory<V> for UnifiedStorageFactory
where
    V: Clone + Send + Sync + 'static,
{
    fn create_from_config(&self, config: &StoreConfig) -> Arc<dyn CacheStore<V>> {
        info!(name = %config.name, backend = ?config.backend, "Creating cache store");
        match config.backend {
            CacheBackend::DashMap => Arc::new(DashMapCacheStore::with_clock(
                config.name.clone(),
                self.clock.clone(),
            )),
            CacheBackend::Moka => Arc::new(MokaCacheStore::new(&config.name, config.max_entries)),
        }
    }
}
