use serde::Serialize;
use shared::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod response {
    #[derive(Clone, Debug)]
    pub struct PutResponse {
        /// false when an existing entry was overwritten
        pub created: bool,
        pub expires_at_ms: u64,
    }

    impl PutResponse {
        pub fn new(created: bool, expires_at_ms: u64) -> Self {
            Self {
                created,
                expires_at_ms,
            }
        }
    }

    #[derive(Clone, Debug)]
    pub struct DeleteResponse {
        pub deleted: bool,
    }

    impl DeleteResponse {
        pub fn new(deleted: bool) -> Self {
            Self { deleted }
        }
    }
}

// === Cache ===

/// API endpoints whose responses may be cached
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    News,
    RealEstate,
    Subway,
    Bus,
    Medical,
    Weather,
    Guides,
    Academy,
}

impl Endpoint {
    pub const ALL: [Endpoint; 8] = [
        Endpoint::News,
        Endpoint::RealEstate,
        Endpoint::Subway,
        Endpoint::Bus,
        Endpoint::Medical,
        Endpoint::Weather,
        Endpoint::Guides,
        Endpoint::Academy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::News => "news",
            Endpoint::RealEstate => "realestate",
            Endpoint::Subway => "subway",
            Endpoint::Bus => "bus",
            Endpoint::Medical => "medical",
            Endpoint::Weather => "weather",
            Endpoint::Guides => "guides",
            Endpoint::Academy => "academy",
        }
    }

    /// Built-in time-to-live for cached responses of this endpoint
    pub fn default_ttl(&self) -> Duration {
        let minutes = match self {
            Endpoint::News => 5,
            Endpoint::RealEstate => 30,
            Endpoint::Subway => 1,
            Endpoint::Medical => 60,
            Endpoint::Weather => 10,
            Endpoint::Guides => 120,
            Endpoint::Bus | Endpoint::Academy => 5,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| Error::UnknownEndpoint(s.to_string()))
    }
}

/// Endpoint -> TTL lookup table, the built-in defaults plus validated overrides
#[derive(Clone, Debug, Default)]
pub struct TtlPolicy {
    overrides: HashMap<Endpoint, Duration>,
}

impl TtlPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, endpoint: Endpoint, ttl: Duration) -> Result<Self> {
        if ttl.is_zero() {
            return Err(Error::InvalidTtl {
                endpoint: endpoint.name().to_string(),
                reason: "ttl must be greater than zero",
            });
        }
        self.overrides.insert(endpoint, ttl);
        Ok(self)
    }

    /// Build a policy from `(endpoint name, minutes)` pairs, rejecting unknown names
    pub fn from_overrides(overrides: &[(String, u64)]) -> Result<Self> {
        overrides.iter().try_fold(Self::new(), |policy, (name, minutes)| {
            let endpoint: Endpoint = name.parse()?;
            let secs = minutes.checked_mul(60).ok_or_else(|| Error::InvalidTtl {
                endpoint: endpoint.name().to_string(),
                reason: "ttl is too large",
            })?;
            policy.with_override(endpoint, Duration::from_secs(secs))
        })
    }

    pub fn ttl_for(&self, endpoint: Endpoint) -> Duration {
        self.overrides
            .get(&endpoint)
            .copied()
            .unwrap_or_else(|| endpoint.default_ttl())
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub data: V,
    pub stored_at_ms: u64,
    pub expires_at_ms: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(data: V, now_ms: u64, ttl: Duration) -> Self {
        Self {
            data,
            stored_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(ttl.as_millis() as u64),
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
    pub valid: usize,
}

/// Store construction parameters handed to a `StorageFactory`
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub name: String,
    pub backend: shared::config::CacheBackend,
    pub max_entries: Option<u64>,
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, backend: shared::config::CacheBackend) -> Self {
        Self {
            name: name.into(),
            backend,
            max_entries: None,
        }
    }

    pub fn with_max_entries(mut self, max_entries: Option<u64>) -> Self {
        self.max_entries = max_entries;
        self
    }
}

// === Metrics ===

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// How a monitored call ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    Success { status: u16 },
    Cached,
    Failure { status: u16, error: String },
}

impl CallOutcome {
    pub fn ok() -> Self {
        CallOutcome::Success { status: 200 }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        CallOutcome::Failure {
            status: 500,
            error: error.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CallOutcome::Success { status } | CallOutcome::Failure { status, .. } => *status,
            CallOutcome::Cached => 200,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, CallOutcome::Cached)
    }

    pub fn is_error(&self) -> bool {
        self.status_code() >= 400
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CallOutcome::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// A call observation before it is timestamped by the aggregator
#[derive(Clone, Debug)]
pub struct MetricSample {
    pub endpoint: String,
    pub method: Method,
    pub response_time_ms: u64,
    pub outcome: CallOutcome,
}

impl MetricSample {
    pub fn new(
        endpoint: impl Into<String>,
        method: Method,
        response_time_ms: u64,
        outcome: CallOutcome,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            response_time_ms,
            outcome,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CallMetric {
    pub endpoint: String,
    pub method: Method,
    pub response_time_ms: u64,
    pub outcome: CallOutcome,
    pub timestamp_ms: u64,
}

impl CallMetric {
    pub fn group_key(&self) -> String {
        format!("{} {}", self.method, self.endpoint)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedMetric {
    pub endpoint: String,
    pub total_requests: usize,
    pub average_response_time_ms: f64,
    pub error_rate_pct: f64,
    pub cache_hit_rate_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_timestamp_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OverallStats {
    pub total_requests: usize,
    pub average_response_time_ms: f64,
    pub error_rate_pct: f64,
    pub cache_hit_rate_pct: f64,
    pub uptime_ms: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    pub max_average_response_ms: f64,
    pub max_error_rate_pct: f64,
    pub min_cache_hit_rate_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_average_response_ms: 2000.0,
            max_error_rate_pct: 5.0,
            min_cache_hit_rate_pct: 50.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ThresholdReport {
    pub slow_endpoints: Vec<String>,
    pub high_error_endpoints: Vec<String>,
    pub low_cache_endpoints: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_table() {
        assert_eq!(Endpoint::News.default_ttl(), Duration::from_secs(5 * 60));
        assert_eq!(Endpoint::RealEstate.default_ttl(), Duration::from_secs(30 * 60));
        assert_eq!(Endpoint::Subway.default_ttl(), Duration::from_secs(60));
        assert_eq!(Endpoint::Medical.default_ttl(), Duration::from_secs(60 * 60));
        assert_eq!(Endpoint::Weather.default_ttl(), Duration::from_secs(10 * 60));
        assert_eq!(Endpoint::Guides.default_ttl(), Duration::from_secs(120 * 60));
        assert_eq!(Endpoint::Bus.default_ttl(), Duration::from_secs(5 * 60));
    }

    #[test]
    fn test_endpoint_names_round_trip() {
        for endpoint in Endpoint::ALL {
            assert_eq!(endpoint.name().parse::<Endpoint>().unwrap(), endpoint);
        }
        assert!(matches!(
            "stocks".parse::<Endpoint>(),
            Err(Error::UnknownEndpoint(name)) if name == "stocks"
        ));
    }

    #[test]
    fn test_ttl_policy_overrides() {
        let policy =
            TtlPolicy::from_overrides(&[("news".to_string(), 15), ("subway".to_string(), 2)])
                .unwrap();

        assert_eq!(policy.ttl_for(Endpoint::News), Duration::from_secs(15 * 60));
        assert_eq!(policy.ttl_for(Endpoint::Subway), Duration::from_secs(2 * 60));
        assert_eq!(policy.ttl_for(Endpoint::Weather), Duration::from_secs(10 * 60));
    }

    #[test]
    fn test_ttl_policy_rejects_bad_overrides() {
        assert!(matches!(
            TtlPolicy::from_overrides(&[("news".to_string(), 0)]),
            Err(Error::InvalidTtl { .. })
        ));
        assert!(matches!(
            TtlPolicy::from_overrides(&[("nope".to_string(), 5)]),
            Err(Error::UnknownEndpoint(_))
        ));
    }

    #[test]
    fn test_ttl_policy_rejects_overflowing_minutes() {
        assert!(matches!(
            TtlPolicy::from_overrides(&[("news".to_string(), u64::MAX / 10)]),
            Err(Error::InvalidTtl { .. })
        ));

        let policy = TtlPolicy::from_overrides(&[("news".to_string(), 15)]).unwrap();
        assert_eq!(policy.ttl_for(Endpoint::News), Duration::from_secs(900));
    }

    #[test]
    fn test_call_outcome_classification() {
        assert_eq!(CallOutcome::ok().status_code(), 200);
        assert!(!CallOutcome::ok().is_error());
        assert!(CallOutcome::Cached.is_cached());

        let failed = CallOutcome::failed("boom");
        assert!(failed.is_error());
        assert_eq!(failed.error(), Some("boom"));

        let not_found = CallOutcome::Failure {
            status: 404,
            error: "missing".into(),
        };
        assert!(not_found.is_error());
    }
}
