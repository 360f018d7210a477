use crate::models::{ApiError, ApiResponse};
use crate::state::AppState;
use axum::extract::{Query, State};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use songdo::domain::{Endpoint, Method};
use songdo::realestate::kst_date;
use songdo::{CacheKey, Clock};
use std::time::Instant;
use tracing::{info, warn};

pub const NEW_DEALS_PATH: &str = "/api/realestate/new";

#[derive(Debug, Deserialize)]
pub struct NewDealsQuery {
    pub today: Option<String>,
    pub yesterday: Option<String>,
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::validation(format!("{} must be a YYYY-MM-DD date, got '{}'", name, raw))
    })
}

/// GET /api/realestate/new
pub async fn new_deals(
    State(state): State<AppState>,
    Query(query): Query<NewDealsQuery>,
) -> Result<ApiResponse<Value>, ApiError> {
    let today = match query.today.as_deref() {
        Some(raw) => parse_date("today", raw)?,
        None => kst_date(state.clock.now_ms()),
    };
    let yesterday = match query.yesterday.as_deref() {
        Some(raw) => parse_date("yesterday", raw)?,
        None => today.pred_opt().unwrap_or(today),
    };
    if yesterday >= today {
        return Err(ApiError::validation(format!(
            "yesterday ({}) must be before today ({})",
            yesterday, today
        )));
    }

    let today_param = today.to_string();
    let yesterday_param = yesterday.to_string();
    let key = CacheKey::with_params(
        Endpoint::RealEstate,
        [
            ("today", Some(today_param.as_str())),
            ("yesterday", Some(yesterday_param.as_str())),
        ],
    );

    let started = Instant::now();
    // `cached` is only known after the lookup
    let mut call = state.metrics.start_call(NEW_DEALS_PATH, Method::Get);
    let detector = state.detector.clone();
    let result = state
        .cache
        .with_cache_lookup(&key, None, || async move {
            let report = detector.detect(today, yesterday).await?;
            serde_json::to_value(report).map_err(|e| shared::Error::Internal(e.to_string()))
        })
        .await;

    match result {
        Ok(lookup) => {
            call.succeeded(lookup.hit);
            drop(call);
            info!(%today, %yesterday, cached = lookup.hit, "New deals served");
            Ok(ApiResponse::ok(lookup.value).with_meta(json!({
                "cached": lookup.hit,
                "cache_key": key.as_str(),
                "response_time_ms": started.elapsed().as_millis() as u64,
            })))
        }
        Err(e) => {
            call.failed(e.to_string());
            drop(call);
            warn!(%today, %yesterday, error = %e, "New deal detection failed");
            Err(e.into())
        }
    }
}
