#![deny(clippy::all)]

pub mod cache_key;
pub mod clock;
pub mod domain;
pub mod monitor;
pub mod planes;
pub mod ports;
pub mod realestate;

pub use cache_key::{create_cache_key, CacheKey};
pub use clock::{Clock, ManualClock, SystemClock};
pub use monitor::{CallGuard, MetricsAggregator};
pub use planes::control::MaintenanceJob;
pub use planes::data::ResponseCache;
