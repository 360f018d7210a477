use super::deal::{Deal, DealSnapshot};
use super::diff::dedupe;
use crate::ports::TradeSource;
use chrono::{Datelike, NaiveDate};
use shared::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_ROWS_PER_PAGE: u32 = 100;
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 3;

/// Walks the paginated trade API and turns trade items into deals
pub struct DealCollector {
    source: Arc<dyn TradeSource>,
    dong: String,
    lookback_months: u32,
    rows_per_page: u32,
}

impl DealCollector {
    pub fn new(source: Arc<dyn TradeSource>, dong: impl Into<String>) -> Self {
        Self {
            source,
            dong: dong.into(),
            lookback_months: DEFAULT_LOOKBACK_MONTHS,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }

    pub fn with_lookback_months(mut self, months: u32) -> Self {
        self.lookback_months = months.max(1);
        self
    }

    pub fn with_rows_per_page(mut self, rows: u32) -> Self {
        self.rows_per_page = rows.max(1);
        self
    }

    /// All deals visible at `date`: the lookback window of months, deduplicated
    ///
    /// Fails only when no month could be fetched at all.
    pub async fn collect_for_date(&self, date: NaiveDate) -> Result<Vec<Deal>> {
        let months = year_months(date, self.lookback_months);
        info!(%date, months = ?months, dong = %self.dong, "Collecting deals");

        let mut deals = Vec::new();
        let mut last_error = None;
        let mut fetched_months = 0;
        for ym in &months {
            match self.collect_month(ym).await {
                Ok(month) => {
                    fetched_months += 1;
                    deals.extend(month);
                }
                Err(e) => {
                    warn!(year_month = %ym, error = %e, "Trade month unavailable");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error.filter(|_| fetched_months == 0) {
            return Err(e);
        }

        let collected = deals.len();
        let unique = dedupe(deals);
        info!(
            %date,
            collected,
            unique = unique.len(),
            "Deal collection finished"
        );
        Ok(unique)
    }

    pub async fn collect_snapshot(&self, date: NaiveDate) -> Result<DealSnapshot> {
        let deals = self.collect_for_date(date).await?;
        Ok(DealSnapshot::new(date, deals, "upstream_api").with_note(format!(
            "deals visible at {} over the last {} months",
            date, self.lookback_months
        )))
    }

    /// Pages through one `YYYYMM` until an empty page, a short page, or a failure
    ///
    /// A failing later page ends the month but keeps what earlier pages
    /// returned; only a failing first page is an error.
    pub async fn collect_month(&self, year_month: &str) -> Result<Vec<Deal>> {
        let mut deals = Vec::new();
        let mut page_no = 1;

        loop {
            let items = match self
                .source
                .fetch_page(year_month, page_no, self.rows_per_page)
                .await
            {
                Ok(items) => items,
                Err(e) if page_no == 1 => return Err(e),
                Err(e) => {
                    warn!(year_month, page_no, error = %e, "Trade page failed, keeping partial month");
                    break;
                }
            };

            if items.is_empty() {
                break;
            }
            debug!(year_month, page_no, items = items.len(), "Trade page fetched");

            let page_len = items.len();
            deals.extend(items.iter().filter_map(|i| Deal::from_trade(i, &self.dong)));

            if page_len < self.rows_per_page as usize {
                break;
            }
            page_no += 1;
        }

        Ok(deals)
    }
}

/// `count` year-months ending at `date`'s month, newest first, as `YYYYMM`
pub fn year_months(date: NaiveDate, count: u32) -> Vec<String> {
    let base = date.year() * 12 + date.month0() as i32;
    (0..count as i32)
        .map(|i| {
            let n = base - i;
            format!("{:04}{:02}", n.div_euclid(12), n.rem_euclid(12) + 1)
        })
        .collect()
}
