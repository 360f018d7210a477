use crate::clock::Clock;
use crate::domain::{
    AggregatedMetric, CallMetric, CallOutcome, Method, MetricSample, OverallStats, ThresholdReport,
    Thresholds,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const THRESHOLD_WINDOW: Duration = Duration::from_secs(3600);

/// Bounded FIFO log of API call metrics with on-demand rollups
pub struct MetricsAggregator {
    log: Mutex<VecDeque<CallMetric>>,
    capacity: usize,
    thresholds: Thresholds,
    clock: Arc<dyn Clock>,
}

impl MetricsAggregator {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            log: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            thresholds: Thresholds::default(),
            clock,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    /// Copy of the retained log, oldest first
    pub fn entries(&self) -> Vec<CallMetric> {
        self.log.lock().iter().cloned().collect()
    }

    pub fn record(&self, sample: MetricSample) {
        let metric = CallMetric {
            endpoint: sample.endpoint,
            method: sample.method,
            response_time_ms: sample.response_time_ms,
            outcome: sample.outcome,
            timestamp_ms: self.clock.now_ms(),
        };

        let mut log = self.log.lock();
        log.push_back(metric);
        while log.len() > self.capacity {
            log.pop_front();
        }
    }

    /// Per `"{METHOD} {endpoint}"` rollups over records newer than `window`
    pub fn aggregated(&self, window: Duration) -> BTreeMap<String, AggregatedMetric> {
        let cutoff = self
            .clock
            .now_ms()
            .saturating_sub(window.as_millis() as u64);

        let log = self.log.lock();
        let mut grouped: BTreeMap<String, Vec<&CallMetric>> = BTreeMap::new();
        for metric in log.iter().filter(|m| m.timestamp_ms > cutoff) {
            grouped.entry(metric.group_key()).or_default().push(metric);
        }

        grouped
            .into_iter()
            .map(|(endpoint, metrics)| {
                let rollup = rollup(&endpoint, &metrics);
                (endpoint, rollup)
            })
            .collect()
    }

    /// Classify endpoints of the last hour against the configured thresholds
    pub fn check_thresholds(&self) -> ThresholdReport {
        let mut report = ThresholdReport::default();

        for (endpoint, metric) in self.aggregated(THRESHOLD_WINDOW) {
            if metric.average_response_time_ms > self.thresholds.max_average_response_ms {
                report.slow_endpoints.push(endpoint.clone());
            }
            if metric.error_rate_pct > self.thresholds.max_error_rate_pct {
                report.high_error_endpoints.push(endpoint.clone());
            }
            if metric.cache_hit_rate_pct < self.thresholds.min_cache_hit_rate_pct {
                report.low_cache_endpoints.push(endpoint);
            }
        }

        report
    }

    /// Totals over the whole retained log
    pub fn overall(&self) -> OverallStats {
        let log = self.log.lock();
        if log.is_empty() {
            return OverallStats::default();
        }

        let metrics: Vec<&CallMetric> = log.iter().collect();
        let rollup = rollup("", &metrics);
        let oldest = metrics
            .iter()
            .map(|m| m.timestamp_ms)
            .min()
            .unwrap_or_default();

        OverallStats {
            total_requests: rollup.total_requests,
            average_response_time_ms: rollup.average_response_time_ms,
            error_rate_pct: rollup.error_rate_pct,
            cache_hit_rate_pct: rollup.cache_hit_rate_pct,
            uptime_ms: self.clock.now_ms().saturating_sub(oldest),
        }
    }

    /// Drop records older than `max_age`, returning how many were dropped
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = self
            .clock
            .now_ms()
            .saturating_sub(max_age.as_millis() as u64);

        let mut log = self.log.lock();
        let before = log.len();
        log.retain(|m| m.timestamp_ms > cutoff);
        before - log.len()
    }

    /// Start timing a call; the returned guard records exactly one metric
    pub fn start_call(&self, endpoint: impl Into<String>, method: Method) -> CallGuard<'_> {
        CallGuard {
            monitor: self,
            endpoint: endpoint.into(),
            method,
            started: Instant::now(),
            outcome: None,
        }
    }

    /// Time `call` and record its outcome, passing the result through untouched
    pub async fn with_monitoring<T, E, F, Fut>(
        &self,
        endpoint: &str,
        method: Method,
        cached: bool,
        call: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut guard = self.start_call(endpoint, method);
        let result = call().await;
        match &result {
            Ok(_) => guard.succeeded(cached),
            Err(e) => guard.failed(e.to_string()),
        }
        result
    }
}

impl std::fmt::Debug for MetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsAggregator")
            .field("capacity", &self.capacity)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

fn rollup(endpoint: &str, metrics: &[&CallMetric]) -> AggregatedMetric {
    let total = metrics.len();
    let errors = metrics.iter().filter(|m| m.outcome.is_error()).count();
    let cached = metrics.iter().filter(|m| m.outcome.is_cached()).count();
    let total_time: u64 = metrics.iter().map(|m| m.response_time_ms).sum();

    // max_by_key keeps the last of equal timestamps, i.e. the most recently logged
    let last_error = metrics
        .iter()
        .filter(|m| m.outcome.error().is_some())
        .max_by_key(|m| m.timestamp_ms);

    let pct = |n: usize| n as f64 / total as f64 * 100.0;

    AggregatedMetric {
        endpoint: endpoint.to_string(),
        total_requests: total,
        average_response_time_ms: total_time as f64 / total as f64,
        error_rate_pct: pct(errors),
        cache_hit_rate_pct: pct(cached),
        last_error: last_error.and_then(|m| m.outcome.error().map(str::to_string)),
        last_error_timestamp_ms: last_error.map(|m| m.timestamp_ms),
    }
}

/// Records one metric when finished, or a failure if dropped unfinished
pub struct CallGuard<'a> {
    monitor: &'a MetricsAggregator,
    endpoint: String,
    method: Method,
    started: Instant,
    outcome: Option<CallOutcome>,
}

impl CallGuard<'_> {
    pub fn succeeded(&mut self, cached: bool) {
        self.outcome = Some(if cached {
            CallOutcome::Cached
        } else {
            CallOutcome::ok()
        });
    }

    pub fn failed(&mut self, error: impl Into<String>) {
        self.outcome = Some(CallOutcome::failed(error));
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| CallOutcome::failed("call did not complete"));
        let elapsed = self.started.elapsed().as_millis() as u64;

        debug!(
            endpoint = %self.endpoint,
            method = %self.method,
            status = outcome.status_code(),
            elapsed_ms = elapsed,
            "API call recorded"
        );

        self.monitor.record(MetricSample::new(
            std::mem::take(&mut self.endpoint),
            self.method,
            elapsed,
            outcome,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn monitor() -> (MetricsAggregator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000_000));
        (MetricsAggregator::new(DEFAULT_CAPACITY, clock.clone()), clock)
    }

    fn sample(endpoint: &str, ms: u64, outcome: CallOutcome) -> MetricSample {
        MetricSample::new(endpoint, Method::Get, ms, outcome)
    }

    #[test]
    fn test_log_is_bounded_fifo() {
        let (monitor, _clock) = monitor();

        for i in 0..1001u64 {
            monitor.record(sample(&format!("/api/{}", i), i, CallOutcome::ok()));
        }

        let entries = monitor.entries();
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0].endpoint, "/api/1");
        assert_eq!(entries[999].endpoint, "/api/1000");
    }

    #[test]
    fn test_empty_window_yields_empty_map() {
        let (monitor, clock) = monitor();
        assert!(monitor.aggregated(Duration::from_secs(60)).is_empty());

        monitor.record(sample("/api/news", 10, CallOutcome::ok()));
        clock.advance(Duration::from_secs(61));
        assert!(monitor.aggregated(Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn test_rollup_rates() {
        let (monitor, _clock) = monitor();
        for _ in 0..3 {
            monitor.record(sample("/api/news", 100, CallOutcome::Cached));
        }
        monitor.record(sample("/api/news", 500, CallOutcome::ok()));

        let aggregated = monitor.aggregated(Duration::from_secs(3600));
        let news = &aggregated["GET /api/news"];

        assert_eq!(news.total_requests, 4);
        assert_eq!(news.error_rate_pct, 0.0);
        assert_eq!(news.cache_hit_rate_pct, 75.0);
        assert_eq!(news.average_response_time_ms, 200.0);
        assert!(news.last_error.is_none());
    }

    #[test]
    fn test_grouping_by_method_and_latest_error() {
        let (monitor, clock) = monitor();
        monitor.record(sample("/api/bus", 50, CallOutcome::failed("timeout")));
        clock.advance(Duration::from_millis(5));
        monitor.record(sample("/api/bus", 50, CallOutcome::failed("bad gateway")));
        monitor.record(MetricSample::new(
            "/api/bus",
            Method::Post,
            20,
            CallOutcome::ok(),
        ));

        let aggregated = monitor.aggregated(Duration::from_secs(60));
        assert_eq!(aggregated.len(), 2);

        let get = &aggregated["GET /api/bus"];
        assert_eq!(get.error_rate_pct, 100.0);
        assert_eq!(get.last_error.as_deref(), Some("bad gateway"));
        assert_eq!(get.last_error_timestamp_ms, Some(10_000_005));

        assert_eq!(aggregated["POST /api/bus"].total_requests, 1);
    }

    #[test]
    fn test_thresholds_flag_slow_errors_and_low_cache() {
        let (monitor, _clock) = monitor();
        monitor.record(sample("/api/slow", 2500, CallOutcome::Cached));
        monitor.record(sample("/api/fast", 1000, CallOutcome::Cached));
        monitor.record(sample("/api/broken", 10, CallOutcome::failed("boom")));

        let report = monitor.check_thresholds();

        assert_eq!(report.slow_endpoints, vec!["GET /api/slow"]);
        assert_eq!(report.high_error_endpoints, vec!["GET /api/broken"]);
        assert_eq!(report.low_cache_endpoints, vec!["GET /api/broken"]);
    }

    #[test]
    fn test_custom_thresholds_and_capacity() {
        let clock = Arc::new(ManualClock::new(10_000_000));
        let monitor = MetricsAggregator::new(0, clock).with_thresholds(Thresholds {
            max_average_response_ms: 500.0,
            max_error_rate_pct: 50.0,
            min_cache_hit_rate_pct: 0.0,
        });
        assert_eq!(monitor.capacity(), 1);

        monitor.record(sample("/api/bus", 900, CallOutcome::ok()));

        let report = monitor.check_thresholds();
        assert_eq!(report.slow_endpoints, vec!["GET /api/bus"]);
        assert!(report.high_error_endpoints.is_empty());
        assert!(report.low_cache_endpoints.is_empty());
    }

    #[test]
    fn test_thresholds_ignore_records_older_than_an_hour() {
        let (monitor, clock) = monitor();
        monitor.record(sample("/api/slow", 9000, CallOutcome::Cached));
        clock.advance(Duration::from_secs(3601));

        assert_eq!(monitor.check_thresholds(), ThresholdReport::default());
    }

    #[test]
    fn test_overall_stats_and_uptime() {
        let (monitor, clock) = monitor();
        assert_eq!(monitor.overall(), OverallStats::default());

        monitor.record(sample("/api/a", 100, CallOutcome::ok()));
        clock.advance(Duration::from_secs(30));
        monitor.record(sample("/api/b", 300, CallOutcome::failed("x")));

        let overall = monitor.overall();
        assert_eq!(overall.total_requests, 2);
        assert_eq!(overall.average_response_time_ms, 200.0);
        assert_eq!(overall.error_rate_pct, 50.0);
        assert_eq!(overall.cache_hit_rate_pct, 0.0);
        assert_eq!(overall.uptime_ms, 30_000);
    }

    #[test]
    fn test_cleanup_drops_old_records() {
        let (monitor, clock) = monitor();
        monitor.record(sample("/api/a", 1, CallOutcome::ok()));
        clock.advance(Duration::from_secs(7200));
        monitor.record(sample("/api/b", 1, CallOutcome::ok()));

        assert_eq!(monitor.cleanup(Duration::from_secs(3600)), 1);
        assert_eq!(monitor.entries()[0].endpoint, "/api/b");
    }

    #[tokio::test]
    async fn test_with_monitoring_records_success_and_failure() {
        let (monitor, _clock) = monitor();

        let ok: Result<u32, String> = monitor
            .with_monitoring("/api/weather", Method::Get, true, || async { Ok(7) })
            .await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = monitor
            .with_monitoring("/api/weather", Method::Get, false, || async {
                Err("upstream 503".to_string())
            })
            .await;
        assert_eq!(err, Err("upstream 503".to_string()));

        let entries = monitor.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, CallOutcome::Cached);
        assert_eq!(entries[1].outcome, CallOutcome::failed("upstream 503"));
        assert_eq!(entries[1].outcome.status_code(), 500);
    }

    #[tokio::test]
    async fn test_dropped_call_is_recorded_as_failure() {
        let (monitor, _clock) = monitor();

        {
            let fut = monitor.with_monitoring("/api/medical", Method::Get, false, || async {
                std::future::pending::<Result<(), String>>().await
            });
            let timed_out = tokio::time::timeout(Duration::from_millis(10), fut).await;
            assert!(timed_out.is_err());
        }

        let entries = monitor.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome.error(), Some("call did not complete"));
    }
}
