pub mod environment;

pub use environment::require_non_production;
