use super::collector::DealCollector;
use super::deal::{Deal, DealSnapshot};
use super::diff::new_deals;
use crate::ports::SnapshotRepository;
use chrono::NaiveDate;
use serde::Serialize;
use shared::{Error, Result};
use std::sync::Arc;
use tracing::info;

/// Where the two compared snapshots came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    Files,
    Upstream,
    Mixed,
}

/// Average, highest and lowest price of a deal list, in 만원
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PriceSummary {
    pub count: usize,
    pub average_price: u64,
    pub max_price: u64,
    pub min_price: u64,
}

impl PriceSummary {
    pub fn of(deals: &[Deal]) -> Self {
        if deals.is_empty() {
            return Self::default();
        }
        let prices = deals.iter().map(|d| d.price_numeric);
        let sum: u64 = prices.clone().sum();
        Self {
            count: deals.len(),
            average_price: (sum as f64 / deals.len() as f64).round() as u64,
            max_price: prices.clone().max().unwrap_or(0),
            min_price: prices.min().unwrap_or(0),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NewDealsReport {
    pub today: NaiveDate,
    pub yesterday: NaiveDate,
    pub source: SnapshotSource,
    pub today_total: usize,
    pub yesterday_total: usize,
    pub new_count: usize,
    pub summary: PriceSummary,
    pub new_deals: Vec<Deal>,
}

/// Finds deals that appeared between two daily snapshots
pub struct NewDealDetector {
    snapshots: Arc<dyn SnapshotRepository>,
    collector: DealCollector,
}

impl NewDealDetector {
    pub fn new(snapshots: Arc<dyn SnapshotRepository>, collector: DealCollector) -> Self {
        Self {
            snapshots,
            collector,
        }
    }

    /// Compare the snapshots for `yesterday` and `today`
    ///
    /// Missing snapshots are collected from the upstream API; only the
    /// missing side is fetched.
    pub async fn detect(&self, today: NaiveDate, yesterday: NaiveDate) -> Result<NewDealsReport> {
        if yesterday >= today {
            return Err(Error::InvalidDate(format!(
                "yesterday ({}) must be before today ({})",
                yesterday, today
            )));
        }

        let stored_today = self.snapshots.load(today).await?;
        let stored_yesterday = self.snapshots.load(yesterday).await?;

        let source = match (&stored_today, &stored_yesterday) {
            (Some(_), Some(_)) => SnapshotSource::Files,
            (None, None) => SnapshotSource::Upstream,
            _ => SnapshotSource::Mixed,
        };

        let today_snapshot = self.resolve(today, stored_today).await?;
        let yesterday_snapshot = self.resolve(yesterday, stored_yesterday).await?;

        let found = new_deals(&yesterday_snapshot.deals, &today_snapshot.deals);
        info!(
            %today,
            %yesterday,
            ?source,
            new_count = found.len(),
            "New deal detection finished"
        );

        Ok(NewDealsReport {
            today,
            yesterday,
            source,
            today_total: today_snapshot.deals.len(),
            yesterday_total: yesterday_snapshot.deals.len(),
            new_count: found.len(),
            summary: PriceSummary::of(&found),
            new_deals: found,
        })
    }

    /// Collect the snapshot for `date` upstream and persist it
    pub async fn collect_and_save(&self, date: NaiveDate) -> Result<DealSnapshot> {
        let snapshot = self.collector.collect_snapshot(date).await?;
        self.snapshots.save(&snapshot).await?;
        info!(%date, total = snapshot.total_count, "Snapshot saved");
        Ok(snapshot)
    }

    async fn resolve(&self, date: NaiveDate, stored: Option<DealSnapshot>) -> Result<DealSnapshot> {
        match stored {
            Some(snapshot) => Ok(snapshot),
            None => {
                info!(%date, "Snapshot missing, collecting from upstream");
                self.collector.collect_snapshot(date).await
            }
        }
    }
}
