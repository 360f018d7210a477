//! Client for the MOLIT apartment trade API (`getRTMSDataSvcAptTrade`)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::config::UpstreamConfig;
use shared::{Error, Result};
use songdo::ports::TradeSource;
use songdo::realestate::TradeItem;
use tracing::{debug, warn};

const SUCCESS_CODES: [&str; 2] = ["00", "000"];

#[derive(Debug, Deserialize)]
struct Envelope {
    header: Option<Header>,
    body: Option<Body>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(rename = "resultCode", default)]
    result_code: String,
    #[serde(rename = "resultMsg", default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct Body {
    items: Option<Items>,
}

#[derive(Debug, Default, Deserialize)]
struct Items {
    #[serde(default)]
    item: Vec<TradeItem>,
}

/// Decode one page of `response/body/items/item`
///
/// A missing `items` element is an empty page; a non-success result code
/// or an undecodable body is `Error::Upstream`.
pub fn parse_trade_page(xml: &str) -> Result<Vec<TradeItem>> {
    let envelope: Envelope = quick_xml::de::from_str(xml)
        .map_err(|e| Error::Upstream(format!("undecodable trade response: {}", e)))?;

    if let Some(header) = &envelope.header {
        if !SUCCESS_CODES.contains(&header.result_code.trim()) {
            return Err(Error::Upstream(format!(
                "trade API returned {}: {}",
                header.result_code, header.result_msg
            )));
        }
    }

    match envelope.body {
        Some(body) => Ok(body.items.unwrap_or_default().item),
        None if envelope.header.is_some() => Ok(Vec::new()),
        None => Err(Error::Upstream("trade response has no header or body".into())),
    }
}

#[derive(Clone)]
pub struct MolitTradeClient {
    client: Client,
    base_url: String,
    service_key: String,
    area_code: String,
}

impl MolitTradeClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            service_key: config.service_key.clone(),
            area_code: config.area_code.clone(),
        })
    }
}

#[async_trait]
impl TradeSource for MolitTradeClient {
    async fn fetch_page(
        &self,
        year_month: &str,
        page_no: u32,
        rows: u32,
    ) -> Result<Vec<TradeItem>> {
        debug!(year_month, page_no, rows, "Requesting trade page");
        let page = page_no.to_string();
        let rows = rows.to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("LAWD_CD", self.area_code.as_str()),
                ("DEAL_YMD", year_month),
                ("numOfRows", rows.as_str()),
                ("pageNo", page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(year_month, page_no, "Trade request failed: {}", e);
                Error::Upstream(format!("trade request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "HTTP {} for {} page {}",
                status.as_u16(),
                year_month,
                page_no
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Upstream(format!("failed to read trade response: {}", e)))?;

        parse_trade_page(&body)
    }
}

impl std::fmt::Debug for MolitTradeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MolitTradeClient")
            .field("base_url", &self.base_url)
            .field("area_code", &self.area_code)
            .finish()
    }
}
