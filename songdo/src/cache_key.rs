use crate::domain::Endpoint;
use std::fmt;

/// Cache key for an endpoint response, always prefixed by the endpoint name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    endpoint: Endpoint,
    key: String,
}

impl CacheKey {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            key: endpoint.name().to_string(),
        }
    }

    /// Key over query parameters; `None` values are skipped and order does not matter
    pub fn with_params<I, K, V>(endpoint: Endpoint, params: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            endpoint,
            key: create_cache_key(endpoint.name(), Some(params)),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// `endpoint` alone, or `endpoint?k1=v1&k2=v2` with keys in ordinal order
pub fn create_cache_key<I, K, V>(endpoint: &str, params: Option<I>) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let Some(params) = params else {
        return endpoint.to_string();
    };

    let mut pairs: Vec<(K, V)> = params
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect();
    pairs.sort_by(|(a, _), (b, _)| a.as_ref().cmp(b.as_ref()));

    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", endpoint, joined)
}
