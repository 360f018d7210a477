use crate::monitor::MetricsAggregator;
use crate::planes::data::ResponseCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_METRICS_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_METRICS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Periodic garbage collection of expired cache entries and stale metrics
///
/// Owned by the host: long-running servers start it, short-lived hosts never do.
pub struct MaintenanceJob<V> {
    cache: Arc<ResponseCache<V>>,
    metrics: Arc<MetricsAggregator>,
    cache_interval: Duration,
    metrics_interval: Duration,
    metrics_max_age: Duration,
    shutdown: CancellationToken,
}

impl<V> MaintenanceJob<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(cache: Arc<ResponseCache<V>>, metrics: Arc<MetricsAggregator>) -> Self {
        Self {
            cache,
            metrics,
            cache_interval: DEFAULT_CACHE_CLEANUP_INTERVAL,
            metrics_interval: DEFAULT_METRICS_CLEANUP_INTERVAL,
            metrics_max_age: DEFAULT_METRICS_MAX_AGE,
            shutdown: CancellationToken::new(),
        }
    }

    /// Zero periods are ignored and the current interval is kept
    pub fn with_intervals(mut self, cache_interval: Duration, metrics_interval: Duration) -> Self {
        if cache_interval.is_zero() {
            warn!("Ignoring zero cache cleanup interval");
        } else {
            self.cache_interval = cache_interval;
        }
        if metrics_interval.is_zero() {
            warn!("Ignoring zero metrics cleanup interval");
        } else {
            self.metrics_interval = metrics_interval;
        }
        self
    }

    pub fn with_metrics_max_age(mut self, max_age: Duration) -> Self {
        self.metrics_max_age = max_age;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// One cache cleanup pass; returns evicted entry count
    pub async fn run_cache_cycle(&self) -> usize {
        match self.cache.cleanup().await {
            Ok(evicted) => {
                if evicted > 0 {
                    info!(evicted, "Cache cleanup cycle completed");
                }
                evicted
            }
            Err(e) => {
                error!(error = %e, "Cache cleanup cycle failed");
                0
            }
        }
    }

    /// One metrics cleanup pass; returns dropped record count
    pub fn run_metrics_cycle(&self) -> usize {
        let dropped = self.metrics.cleanup(self.metrics_max_age);
        if dropped > 0 {
            info!(dropped, "Metrics cleanup cycle completed");
        }
        dropped
    }

    pub fn start(self: Arc<Self>) -> MaintenanceHandle {
        info!(
            cache_interval_secs = self.cache_interval.as_secs(),
            metrics_interval_secs = self.metrics_interval.as_secs(),
            "Starting maintenance background jobs"
        );

        let cache_job = Arc::clone(&self);
        let cache_shutdown = self.shutdown.clone();
        let cache_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cache_job.cache_interval);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cache_shutdown.cancelled() => {
                        info!("MaintenanceJob (cache): shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        cache_job.run_cache_cycle().await;
                    }
                }
            }
        });

        let metrics_job = Arc::clone(&self);
        let metrics_shutdown = self.shutdown.clone();
        let metrics_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(metrics_job.metrics_interval);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = metrics_shutdown.cancelled() => {
                        info!("MaintenanceJob (metrics): shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        metrics_job.run_metrics_cycle();
                    }
                }
            }
        });

        MaintenanceHandle {
            shutdown: self.shutdown.clone(),
            tasks: vec![cache_task, metrics_task],
        }
    }
}

/// Stops the maintenance tasks it was returned for
pub struct MaintenanceHandle {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    pub async fn stop(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Maintenance task ended abnormally");
            }
        }
    }
}
