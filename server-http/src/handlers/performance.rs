use crate::models::{ApiError, ApiResponse, now_rfc3339};
use crate::state::AppState;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use serde_json::json;
use songdo::Clock;
use songdo::clock::format_utc_time;
use songdo::domain::{AggregatedMetric, CacheStats, OverallStats, ThresholdReport};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIME_WINDOW_MS: u64 = 3_600_000;
const MAX_HEALTHY_ENDPOINT_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    #[serde(rename = "timeWindow")]
    pub time_window: Option<String>,
}

impl PerformanceQuery {
    /// Window in milliseconds; absent means the default hour
    pub fn time_window_ms(&self) -> Result<u64, ApiError> {
        match self.time_window.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_TIME_WINDOW_MS),
            Some(raw) => raw.parse::<u64>().ok().filter(|ms| *ms > 0).ok_or_else(|| {
                ApiError::validation(format!(
                    "timeWindow must be a positive number of milliseconds, got '{}'",
                    raw
                ))
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Overview {
    #[serde(flatten)]
    pub stats: OverallStats,
    pub time_window_ms: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct CacheOverview {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheOverview {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = if stats.total > 0 {
            stats.valid as f64 / stats.total as f64 * 100.0
        } else {
            0.0
        };
        Self { stats, hit_rate }
    }
}

#[derive(Debug, Serialize)]
pub struct PerformanceReport {
    pub overview: Overview,
    pub endpoints: BTreeMap<String, AggregatedMetric>,
    pub alerts: ThresholdReport,
    pub cache: CacheOverview,
    pub recommendations: Vec<String>,
}

/// GET /api/performance
pub async fn performance_stats(
    State(state): State<AppState>,
    Query(query): Query<PerformanceQuery>,
) -> Result<ApiResponse<PerformanceReport>, ApiError> {
    let time_window_ms = query.time_window_ms()?;
    debug!(time_window_ms, "Building performance report");

    let endpoints = state
        .metrics
        .aggregated(Duration::from_millis(time_window_ms));
    let alerts = state.metrics.check_thresholds();
    let cache_stats = state.cache.stats().await?;
    let recommendations = recommendations(&endpoints, &alerts, &cache_stats);

    let report = PerformanceReport {
        overview: Overview {
            stats: state.metrics.overall(),
            time_window_ms,
            timestamp: format_utc_time(state.clock.now_ms()),
        },
        endpoints,
        alerts,
        cache: cache_stats.into(),
        recommendations,
    };

    Ok(ApiResponse::ok(report).with_meta(json!({
        "development_only": true,
        "time_window": format!("{}ms", time_window_ms),
        "generated_at": now_rfc3339(),
    })))
}

pub fn recommendations(
    endpoints: &BTreeMap<String, AggregatedMetric>,
    alerts: &ThresholdReport,
    cache: &CacheStats,
) -> Vec<String> {
    let mut out = Vec::new();

    if !alerts.slow_endpoints.is_empty() {
        out.push(format!(
            "Optimize slow endpoints: {}",
            alerts.slow_endpoints.join(", ")
        ));
    }
    if !alerts.high_error_endpoints.is_empty() {
        out.push(format!(
            "Investigate endpoints with high error rates: {}",
            alerts.high_error_endpoints.join(", ")
        ));
    }
    if !alerts.low_cache_endpoints.is_empty() {
        out.push(format!(
            "Improve caching for: {}",
            alerts.low_cache_endpoints.join(", ")
        ));
    }
    if cache.expired > cache.valid {
        out.push("Expired cache entries outnumber valid ones; run cache cleanup".to_string());
    }
    if endpoints.len() > MAX_HEALTHY_ENDPOINT_COUNT {
        out.push(format!(
            "{} monitored endpoints; consider consolidating",
            endpoints.len()
        ));
    }

    if out.is_empty() {
        out.push("API performance is healthy".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_when_nothing_to_report() {
        let recs = recommendations(
            &BTreeMap::new(),
            &ThresholdReport::default(),
            &CacheStats::default(),
        );
        assert_eq!(recs, vec!["API performance is healthy".to_string()]);
    }

    #[test]
    fn test_alerts_and_expired_entries_are_reported() {
        let alerts = ThresholdReport {
            slow_endpoints: vec!["GET /api/subway".into()],
            high_error_endpoints: vec![],
            low_cache_endpoints: vec!["GET /api/news".into(), "GET /api/bus".into()],
        };
        let cache = CacheStats {
            total: 3,
            expired: 2,
            valid: 1,
        };

        let recs = recommendations(&BTreeMap::new(), &alerts, &cache);

        assert_eq!(recs.len(), 3);
        assert!(recs[0].contains("GET /api/subway"));
        assert!(recs[1].contains("GET /api/news, GET /api/bus"));
        assert!(recs[2].contains("Expired"));
    }

    #[test]
    fn test_time_window_parsing() {
        let query = |raw: Option<&str>| PerformanceQuery {
            time_window: raw.map(str::to_string),
        };

        assert_eq!(query(None).time_window_ms().unwrap(), DEFAULT_TIME_WINDOW_MS);
        assert_eq!(query(Some("60000")).time_window_ms().unwrap(), 60_000);
        assert!(query(Some("abc")).time_window_ms().is_err());
        assert!(query(Some("0")).time_window_ms().is_err());
    }

    #[test]
    fn test_cache_hit_rate() {
        let overview = CacheOverview::from(CacheStats {
            total: 4,
            expired: 1,
            valid: 3,
        });
        assert_eq!(overview.hit_rate, 75.0);
        assert_eq!(CacheOverview::from(CacheStats::default()).hit_rate, 0.0);
    }
}
