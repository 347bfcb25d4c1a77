use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use time::Date;
use tracing::debug;

use crate::adjust::Adjust;
use crate::dates::{compact, dashed};
use crate::feed::{DailyBarsRequest, FeedError, MarketFeed};
use crate::http::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::market::Market;
use crate::table::RawTable;
use crate::throttle::RequestBudget;

// ============================================================================
// Endpoint catalogue
// ============================================================================

const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const CLIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";

/// Header names of the kline CSV, in wire order.
const KLINE_COLUMNS: [&str; 11] = [
    "date",
    "open",
    "close",
    "high",
    "low",
    "volume",
    "amount",
    "amplitude",
    "pct_change",
    "change",
    "turnover",
];

/// How a billboard endpoint spells its trade-date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateStyle {
    Dashed,
    Compact,
}

/// One candidate endpoint for the institutional trading detail. The report
/// has moved between datacenter generations, so candidates are tried in
/// order and the first non-empty response wins.
struct DetailEndpoint {
    name: &'static str,
    url: &'static str,
    report: &'static str,
    date_style: DateStyle,
}

const DETAIL_ENDPOINTS: [DetailEndpoint; 2] = [
    DetailEndpoint {
        name: "datacenter-web",
        url: "https://datacenter-web.eastmoney.com/api/data/v1/get",
        report: "RPT_DAILYBILLBOARD_DETAILSNEW",
        date_style: DateStyle::Dashed,
    },
    DetailEndpoint {
        name: "datacenter",
        url: "https://datacenter.eastmoney.com/api/data/v1/get",
        report: "RPT_DAILYBILLBOARD_DETAILS",
        date_style: DateStyle::Compact,
    },
];

// ============================================================================
// Response envelopes
// ============================================================================

#[derive(Debug, Deserialize)]
struct KlineEnvelope {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClistEnvelope {
    data: Option<ClistData>,
}

#[derive(Debug, Deserialize)]
struct ClistData {
    #[serde(default)]
    diff: Vec<ClistRow>,
}

#[derive(Debug, Deserialize)]
struct ClistRow {
    #[serde(rename = "f12")]
    code: Option<Value>,
    #[serde(rename = "f14")]
    name: Option<Value>,
    #[serde(rename = "f26")]
    listing_date: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DatacenterEnvelope {
    result: Option<DatacenterResult>,
}

#[derive(Debug, Deserialize)]
struct DatacenterResult {
    #[serde(default)]
    data: Vec<Value>,
}

// ============================================================================
// Adapter
// ============================================================================

/// Production [`MarketFeed`] over the Eastmoney HTTP endpoints.
///
/// Every remote call first acquires from the shared [`RequestBudget`]; the
/// upstream rate-limits silently and a drained budget must stall the worker,
/// not poison the session.
pub struct EastmoneyFeed {
    http: Arc<dyn HttpClient>,
    budget: RequestBudget,
}

impl Default for EastmoneyFeed {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestHttpClient::new()))
    }
}

impl EastmoneyFeed {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        // 120 requests per rolling minute stays well under observed limits.
        Self::with_budget(http, RequestBudget::new(Duration::from_secs(60), 120))
    }

    pub fn with_budget(http: Arc<dyn HttpClient>, budget: RequestBudget) -> Self {
        Self { http, budget }
    }

    async fn fetch_json(&self, url: String) -> Result<String, FeedError> {
        self.budget.acquire().await;
        let response = self
            .http
            .execute(HttpRequest::get(url).with_header("referer", "https://data.eastmoney.com/"))
            .await
            .map_err(|e| FeedError::unavailable(e.message().to_string()))?;
        if !response.is_success() {
            return Err(FeedError::unavailable(format!(
                "eastmoney upstream returned status {}",
                response.status
            )));
        }
        Ok(response.body)
    }

    async fn fetch_daily_bars(&self, request: &DailyBarsRequest) -> Result<RawTable, FeedError> {
        let symbol = request.symbol();
        let url = format!(
            "{}?secid={}&klt=101&fqt={}&beg={}&end={}&fields1=f1,f2,f3,f4,f5,f6&fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61",
            KLINE_URL,
            secid_from_symbol(&symbol),
            fqt(request),
            compact(request.start),
            compact(request.end),
        );
        let body = self.fetch_json(url).await?;
        let envelope: KlineEnvelope = serde_json::from_str(&body)
            .map_err(|e| FeedError::decode(format!("kline response did not parse: {e}")))?;

        let mut table = RawTable::new(KLINE_COLUMNS.iter().map(|c| c.to_string()).collect());
        let Some(data) = envelope.data else {
            return Ok(table);
        };
        for line in &data.klines {
            let mut row: Vec<Value> = line
                .split(',')
                .take(KLINE_COLUMNS.len())
                .map(|cell| Value::String(cell.to_string()))
                .collect();
            row.resize(KLINE_COLUMNS.len(), Value::Null);
            table.push_row(row);
        }
        Ok(table)
    }

    async fn fetch_security_list(&self, market: Market) -> Result<RawTable, FeedError> {
        let url = format!(
            "{}?pn=1&pz=10000&po=0&np=1&fltt=2&invt=2&fid=f12&fs={}&fields=f12,f14,f26",
            CLIST_URL,
            urlencoding::encode(market_filter(market)),
        );
        let body = self.fetch_json(url).await?;
        let envelope: ClistEnvelope = serde_json::from_str(&body)
            .map_err(|e| FeedError::decode(format!("listing response did not parse: {e}")))?;

        let mut table = RawTable::new(vec![
            "code".to_string(),
            "name".to_string(),
            "listing_date".to_string(),
        ]);
        let Some(data) = envelope.data else {
            return Ok(table);
        };
        for row in data.diff {
            table.push_row(vec![
                row.code.unwrap_or(Value::Null),
                row.name.unwrap_or(Value::Null),
                row.listing_date.unwrap_or(Value::Null),
            ]);
        }
        Ok(table)
    }

    async fn fetch_institutional_detail(&self, date: Date) -> Result<RawTable, FeedError> {
        let mut last_error: Option<FeedError> = None;
        let mut saw_empty = false;

        for endpoint in &DETAIL_ENDPOINTS {
            let date_value = match endpoint.date_style {
                DateStyle::Dashed => dashed(date),
                DateStyle::Compact => compact(date),
            };
            let filter = format!("(TRADE_DATE='{date_value}')");
            let url = format!(
                "{}?reportName={}&columns=ALL&pageNumber=1&pageSize=500&sortColumns=SECURITY_CODE&sortTypes=1&source=WEB&client=WEB&filter={}",
                endpoint.url,
                endpoint.report,
                urlencoding::encode(&filter),
            );

            let body = match self.fetch_json(url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!(endpoint = endpoint.name, error = %e, "billboard endpoint failed, trying next");
                    last_error = Some(e);
                    continue;
                }
            };
            let envelope: DatacenterEnvelope = match serde_json::from_str(&body) {
                Ok(envelope) => envelope,
                Err(e) => {
                    debug!(endpoint = endpoint.name, error = %e, "billboard response did not parse, trying next");
                    last_error = Some(FeedError::decode(e.to_string()));
                    continue;
                }
            };

            let records = envelope.result.map(|r| r.data).unwrap_or_default();
            if records.is_empty() {
                saw_empty = true;
                continue;
            }
            return Ok(RawTable::from_objects(&records));
        }

        // A day every endpoint reports as empty is a non-trading day, not a
        // failure; error only when no endpoint answered at all.
        if saw_empty {
            return Ok(RawTable::default());
        }
        Err(last_error.unwrap_or_else(|| FeedError::internal("no billboard endpoint configured")))
    }
}

impl MarketFeed for EastmoneyFeed {
    fn id(&self) -> &'static str {
        "eastmoney"
    }

    fn daily_bars<'a>(
        &'a self,
        request: DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>> {
        Box::pin(async move { self.fetch_daily_bars(&request).await })
    }

    fn security_list<'a>(
        &'a self,
        market: Market,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>> {
        Box::pin(async move { self.fetch_security_list(market).await })
    }

    fn institutional_detail<'a>(
        &'a self,
        date: Date,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>> {
        Box::pin(async move { self.fetch_institutional_detail(date).await })
    }
}

/// Maps the provider symbol spelling (`sh600000`) onto the quote API's
/// numeric market id. SZ and BJ both live on market 0.
fn secid_from_symbol(symbol: &str) -> String {
    let (prefix, code) = symbol.split_at(symbol.len().min(2));
    let market = if prefix == "sh" { "1" } else { "0" };
    format!("{market}.{code}")
}

const fn fqt(request: &DailyBarsRequest) -> &'static str {
    match request.adjust {
        Adjust::Raw => "0",
        Adjust::Forward => "1",
        Adjust::Backward => "2",
    }
}

const fn market_filter(market: Market) -> &'static str {
    match market {
        Market::Sh => "m:1+t:2,m:1+t:23",
        Market::Sz => "m:0+t:6,m:0+t:80",
        Market::Bj => "m:0+t:81+s:2048",
    }
}
