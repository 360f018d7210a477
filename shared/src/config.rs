use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Which in-memory store backs the response cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    DashMap,
    Moka,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dashmap" => Ok(CacheBackend::DashMap),
            "moka" => Ok(CacheBackend::Moka),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Upstream apartment trade API settings
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub service_key: String,
    pub area_code: String,
    pub dong: String,
    pub lookback_months: u32,
    pub request_timeout: Duration,
}

pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub environment: Environment,
    pub cache_backend: CacheBackend,
    /// Entry bound for the moka backend; unbounded when unset
    pub cache_max_entries: Option<u64>,
    pub metrics_capacity: usize,
    pub maintenance_enabled: bool,
    pub cache_cleanup_interval: Duration,
    pub metrics_cleanup_interval: Duration,
    pub metrics_max_age: Duration,
    pub snapshot_dir: String,
    pub upstream: UpstreamConfig,
    /// Raw `SONGDO_TTL_<ENDPOINT>_MINUTES` overrides, endpoint name lowercased
    pub ttl_overrides: Vec<(String, u64)>,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 3001;
    const DEFAULT_METRICS_CAPACITY: usize = 1000;
    const DEFAULT_CACHE_CLEANUP_SECS: u64 = 300;
    const DEFAULT_METRICS_CLEANUP_SECS: u64 = 3600;
    const DEFAULT_METRICS_MAX_AGE_SECS: u64 = 86_400;
    const DEFAULT_SNAPSHOT_DIR: &str = "./public/data";
    const DEFAULT_MOLIT_BASE_URL: &str =
        "https://apis.data.go.kr/1613000/RTMSDataSvcAptTrade/getRTMSDataSvcAptTrade";
    const DEFAULT_AREA_CODE: &str = "28185";
    const DEFAULT_DONG: &str = "송도동";
    const DEFAULT_LOOKBACK_MONTHS: u32 = 3;
    const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

    const TTL_PREFIX: &str = "SONGDO_TTL_";
    const TTL_SUFFIX: &str = "_MINUTES";

    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build a config from an explicit set of variables instead of the process environment
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let get = |name: &str| vars.get(name).cloned();

        let environment = match get("SONGDO_ENV") {
            None => Environment::Development,
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}; treating environment as production", e);
                Environment::Production
            }),
        };

        let cache_backend = match get("SONGDO_CACHE_BACKEND") {
            None => CacheBackend::DashMap,
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}; falling back to dashmap", e);
                CacheBackend::DashMap
            }),
        };

        let mut ttl_overrides: Vec<(String, u64)> = vars
            .iter()
            .filter_map(|(name, value)| {
                let endpoint = name
                    .strip_prefix(Self::TTL_PREFIX)?
                    .strip_suffix(Self::TTL_SUFFIX)?;
                match value.trim().parse::<u64>() {
                    Ok(minutes) => Some((endpoint.to_ascii_lowercase(), minutes)),
                    Err(_) => {
                        warn!("Ignoring {}: '{}' is not a number of minutes", name, value);
                        None
                    }
                }
            })
            .collect();
        ttl_overrides.sort();

        Self {
            host: get("SONGDO_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port: parse_or("SONGDO_HTTP_PORT", get("SONGDO_HTTP_PORT"), Self::DEFAULT_HTTP_PORT),
            environment,
            cache_backend,
            cache_max_entries: get("SONGDO_CACHE_MAX_ENTRIES").and_then(|raw| {
                match raw.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Some(n),
                    _ => {
                        warn!("SONGDO_CACHE_MAX_ENTRIES='{}' is invalid, leaving the cache unbounded", raw);
                        None
                    }
                }
            }),
            metrics_capacity: parse_or(
                "SONGDO_METRICS_CAPACITY",
                get("SONGDO_METRICS_CAPACITY"),
                Self::DEFAULT_METRICS_CAPACITY,
            ),
            maintenance_enabled: parse_or("SONGDO_MAINTENANCE", get("SONGDO_MAINTENANCE"), true),
            cache_cleanup_interval: interval_or(
                "SONGDO_CACHE_CLEANUP_SECS",
                get("SONGDO_CACHE_CLEANUP_SECS"),
                Self::DEFAULT_CACHE_CLEANUP_SECS,
            ),
            metrics_cleanup_interval: interval_or(
                "SONGDO_METRICS_CLEANUP_SECS",
                get("SONGDO_METRICS_CLEANUP_SECS"),
                Self::DEFAULT_METRICS_CLEANUP_SECS,
            ),
            metrics_max_age: Duration::from_secs(parse_or(
                "SONGDO_METRICS_MAX_AGE_SECS",
                get("SONGDO_METRICS_MAX_AGE_SECS"),
                Self::DEFAULT_METRICS_MAX_AGE_SECS,
            )),
            snapshot_dir: get("SONGDO_SNAPSHOT_DIR")
                .unwrap_or_else(|| Self::DEFAULT_SNAPSHOT_DIR.to_string()),
            upstream: UpstreamConfig {
                base_url: get("SONGDO_MOLIT_BASE_URL")
                    .unwrap_or_else(|| Self::DEFAULT_MOLIT_BASE_URL.to_string()),
                service_key: get("SONGDO_MOLIT_SERVICE_KEY").unwrap_or_else(|| {
                    warn!("SONGDO_MOLIT_SERVICE_KEY not set, upstream trade requests will be rejected");
                    String::new()
                }),
                area_code: get("SONGDO_AREA_CODE")
                    .unwrap_or_else(|| Self::DEFAULT_AREA_CODE.to_string()),
                dong: get("SONGDO_DONG").unwrap_or_else(|| Self::DEFAULT_DONG.to_string()),
                lookback_months: parse_or(
                    "SONGDO_LOOKBACK_MONTHS",
                    get("SONGDO_LOOKBACK_MONTHS"),
                    Self::DEFAULT_LOOKBACK_MONTHS,
                ),
                request_timeout: Duration::from_secs(parse_or(
                    "SONGDO_UPSTREAM_TIMEOUT_SECS",
                    get("SONGDO_UPSTREAM_TIMEOUT_SECS"),
                    Self::DEFAULT_UPSTREAM_TIMEOUT_SECS,
                )),
            },
            ttl_overrides,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{}='{}' is invalid, using default {}", name, raw, default);
            default
        }),
    }
}

/// Like `parse_or` for a period in seconds, where zero is also invalid
fn interval_or(name: &str, raw: Option<String>, default_secs: u64) -> Duration {
    match parse_or(name, raw, default_secs) {
        0 => {
            warn!("{}=0 is not a valid interval, using default {}", name, default_secs);
            Duration::from_secs(default_secs)
        }
        secs => Duration::from_secs(secs),
    }
}
