//! Real-estate transactions: normalization, collection and new-deal detection

mod collector;
mod deal;
mod detector;
mod diff;

pub use collector::{year_months, DealCollector, DEFAULT_LOOKBACK_MONTHS, DEFAULT_ROWS_PER_PAGE};
pub use deal::{format_price, parse_price, price_per_pyeong, Deal, DealSnapshot, TradeItem};
pub use detector::{NewDealDetector, NewDealsReport, PriceSummary, SnapshotSource};
pub use diff::{dedupe, new_deals};

use chrono::{DateTime, Duration, NaiveDate};

const KST_OFFSET_HOURS: i64 = 9;

/// Calendar date in Korea (UTC+9) at `now_ms`
pub fn kst_date(now_ms: u64) -> NaiveDate {
    DateTime::from_timestamp_millis(now_ms as i64)
        .map(|utc| (utc + Duration::hours(KST_OFFSET_HOURS)).date_naive())
        .unwrap_or_default()
}
