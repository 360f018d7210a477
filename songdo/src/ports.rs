use crate::domain::response::{DeleteResponse, PutResponse};
use crate::domain::{CacheStats, StoreConfig};
use crate::realestate::{DealSnapshot, TradeItem};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::Result;
use std::sync::Arc;
use std::time::Duration;

// Ports are the pluggable extension points for storage and upstream data

/// Port for creating cache storage from configuration
pub trait StorageFactory<V>: Send + Sync + 'static {
    fn create_from_config(&self, config: &StoreConfig) -> Arc<dyn CacheStore<V>>;
}

/// Port for per-entry-TTL key/value storage
///
/// `get` yields `Error::NotFound` for missing and expired keys alike.
#[async_trait]
pub trait CacheStore<V>: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<V>;
    async fn put(&self, key: String, value: V, ttl: Duration) -> Result<PutResponse>;
    async fn delete(&self, key: &str) -> Result<DeleteResponse>;
    /// Drop everything, returning how many entries were removed
    async fn clear(&self) -> Result<usize>;
    /// Evict expired entries, returning how many were evicted
    async fn cleanup(&self) -> Result<usize>;
    async fn stats(&self) -> Result<CacheStats>;
}

/// Port for the paginated upstream apartment trade API
#[async_trait]
pub trait TradeSource: Send + Sync + 'static {
    /// `year_month` is `YYYYMM`; `page_no` starts at 1
    async fn fetch_page(&self, year_month: &str, page_no: u32, rows: u32)
    -> Result<Vec<TradeItem>>;
}

/// Port for dated deal snapshots
#[async_trait]
pub trait SnapshotRepository: Send + Sync + 'static {
    async fn load(&self, date: NaiveDate) -> Result<Option<DealSnapshot>>;
    async fn save(&self, snapshot: &DealSnapshot) -> Result<()>;
}
