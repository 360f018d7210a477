use molit_client::MolitTradeClient;
use serde_json::Value;
use shared::config::{Config, Environment};
use songdo::domain::{StoreConfig, TtlPolicy};
use songdo::ports::{CacheStore, StorageFactory};
use songdo::realestate::{DealCollector, NewDealDetector};
use songdo::{Clock, MaintenanceJob, MetricsAggregator, ResponseCache, SystemClock};
use std::sync::Arc;
use storage_engine::{JsonSnapshotRepository, UnifiedStorageFactory};
use tracing::info;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResponseCache<Value>>,
    pub metrics: Arc<MetricsAggregator>,
    pub detector: Arc<NewDealDetector>,
    pub environment: Environment,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        cache: Arc<ResponseCache<Value>>,
        metrics: Arc<MetricsAggregator>,
        detector: Arc<NewDealDetector>,
        environment: Environment,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            metrics,
            detector,
            environment,
            clock,
        }
    }

    /// Wire the cache, metrics and deal detector described by `config`
    pub fn from_config(config: &Config) -> shared::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let factory = UnifiedStorageFactory::new(clock.clone());
        let store: Arc<dyn CacheStore<Value>> =
            factory.create_from_config(
            &StoreConfig::new("responses", config.cache_backend)
                .with_max_entries(config.cache_max_entries),
        );
        let policy = TtlPolicy::from_overrides(&config.ttl_overrides)?;
        let cache = Arc::new(ResponseCache::new(store, policy));

        let metrics = Arc::new(MetricsAggregator::new(config.metrics_capacity, clock.clone()));

        let source = Arc::new(MolitTradeClient::new(&config.upstream)?);
        let collector = DealCollector::new(source, config.upstream.dong.clone())
            .with_lookback_months(config.upstream.lookback_months);
        let snapshots = Arc::new(JsonSnapshotRepository::new(&config.snapshot_dir));
        let detector = Arc::new(NewDealDetector::new(snapshots, collector));

        info!(
            environment = config.environment.as_str(),
            backend = ?config.cache_backend,
            metrics_capacity = config.metrics_capacity,
            snapshot_dir = %config.snapshot_dir,
            "Application state initialized"
        );

        Ok(Self::new(cache, metrics, detector, config.environment, clock))
    }

    /// Background cleanup for this state's cache and metrics, not yet started
    pub fn maintenance_job(&self, config: &Config) -> MaintenanceJob<Value> {
        MaintenanceJob::new(self.cache.clone(), self.metrics.clone())
            .with_intervals(config.cache_cleanup_interval, config.metrics_cleanup_interval)
            .with_metrics_max_age(config.metrics_max_age)
    }
}
