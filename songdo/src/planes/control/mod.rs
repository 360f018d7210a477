pub mod maintenance;

pub use maintenance::{MaintenanceHandle, MaintenanceJob};
