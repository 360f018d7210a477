//! One-shot daily collection: fetch the deals visible today (KST) and save the snapshot.
//!
//! Usage: `collect-snapshot [YYYY-MM-DD]`

use chrono::NaiveDate;
use server_http::AppState;
use shared::config::Config;
use songdo::Clock;
use songdo::realestate::kst_date;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if dotenvy::dotenv().is_err() {
        info!("No .env file found, using system environment variables");
    }

    let config = Config::from_env();
    let state = AppState::from_config(&config)?;

    let date = match std::env::args().nth(1) {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|e| shared::Error::InvalidDate(format!("'{}': {}", raw, e)))?,
        None => kst_date(state.clock.now_ms()),
    };

    let snapshot = state.detector.collect_and_save(date).await?;
    if snapshot.deals.is_empty() {
        warn!(%date, "No deals collected; the upstream may have returned nothing");
    }
    info!(
        %date,
        total = snapshot.total_count,
        dir = %config.snapshot_dir,
        "Snapshot collection complete"
    );
    Ok(())
}
