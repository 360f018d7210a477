pub mod health;
pub mod performance;
pub mod realestate;

pub use health::health_check;
pub use performance::performance_stats;
pub use realestate::new_deals;
