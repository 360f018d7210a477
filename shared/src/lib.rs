// shared/src/lib.rs

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("invalid ttl for {endpoint}: {reason}")]
    InvalidTtl {
        endpoint: String,
        reason: &'static str,
    },
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("upstream: {0}")]
    Upstream(String),
    #[error("snapshot: {0}")]
    Snapshot(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
