use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const SQM_PER_PYEONG: f64 = 3.3;

/// One `<item>` of the apartment trade API, fields kept as the raw strings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeItem {
    #[serde(rename = "aptNm", default)]
    pub apt_name: String,
    #[serde(rename = "excluUseAr", default)]
    pub exclusive_area: String,
    #[serde(default)]
    pub floor: String,
    #[serde(rename = "dealAmount", default)]
    pub deal_amount: String,
    #[serde(rename = "dealYear", default)]
    pub deal_year: String,
    #[serde(rename = "dealMonth", default)]
    pub deal_month: String,
    #[serde(rename = "dealDay", default)]
    pub deal_day: String,
    #[serde(rename = "buildYear", default)]
    pub build_year: String,
    #[serde(rename = "umdNm", default)]
    pub dong: String,
}

/// A normalized apartment transaction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub apartment_name: String,
    pub area: String,
    pub floor: String,
    pub price: String,
    pub price_numeric: u64,
    pub deal_date: String,
    pub build_year: String,
    pub location: String,
    pub price_per_pyeong: String,
}

impl Deal {
    /// Normalize a trade record located in `dong`
    ///
    /// Records in another dong, without an apartment name, or with an
    /// unparseable price yield `None`.
    pub fn from_trade(item: &TradeItem, dong: &str) -> Option<Self> {
        let apartment_name = item.apt_name.trim();
        if apartment_name.is_empty() || item.dong.trim() != dong {
            return None;
        }
        let price = parse_price(&item.deal_amount)?;
        let area = item.exclusive_area.trim();

        Some(Self {
            apartment_name: apartment_name.to_string(),
            area: format!("{}㎡", area),
            floor: format!("{}층", item.floor.trim()),
            price: format_price(price),
            price_numeric: price,
            deal_date: format_deal_date(&item.deal_year, &item.deal_month, &item.deal_day),
            build_year: item.build_year.trim().to_string(),
            location: item.dong.trim().to_string(),
            price_per_pyeong: price_per_pyeong(price, area),
        })
    }

    /// `apartment_name|area|floor|deal_date|price_numeric`
    pub fn id(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.apartment_name, self.area, self.floor, self.deal_date, self.price_numeric
        )
    }
}

/// Deals collected for one day, persisted as `realestate_{date}.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealSnapshot {
    pub date: NaiveDate,
    pub deals: Vec<Deal>,
    pub timestamp: DateTime<Utc>,
    pub total_count: usize,
    #[serde(default = "default_collection_method")]
    pub collection_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn default_collection_method() -> String {
    "unknown".to_string()
}

impl DealSnapshot {
    pub fn new(date: NaiveDate, deals: Vec<Deal>, collection_method: impl Into<String>) -> Self {
        Self {
            date,
            total_count: deals.len(),
            deals,
            timestamp: Utc::now(),
            collection_method: collection_method.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Price in 만원 from the upstream `dealAmount`, e.g. `" 85,000"` -> 85000
pub fn parse_price(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    digits.trim().parse().ok()
}

/// `12억 3,400만원`, `12억원` or `9,500만원`
pub fn format_price(price: u64) -> String {
    if price >= 10_000 {
        let eok = price / 10_000;
        let man = price % 10_000;
        if man == 0 {
            format!("{}억원", eok)
        } else {
            format!("{}억 {}만원", eok, group_thousands(man))
        }
    } else {
        format!("{}만원", group_thousands(price))
    }
}

pub fn price_per_pyeong(price: u64, area: &str) -> String {
    let per_pyeong = match area.trim().parse::<f64>() {
        Ok(sqm) if sqm > 0.0 => (price as f64 / (sqm / SQM_PER_PYEONG)).round() as u64,
        _ => 0,
    };
    format!("{}만원", group_thousands(per_pyeong))
}

fn format_deal_date(year: &str, month: &str, day: &str) -> String {
    format!(
        "{}-{:0>2}-{:0>2}",
        year.trim(),
        month.trim(),
        day.trim()
    )
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
