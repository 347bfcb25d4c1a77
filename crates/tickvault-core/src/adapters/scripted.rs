use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use serde_json::json;
use time::Date;

use crate::dates::dashed;
use crate::feed::{DailyBarsRequest, FeedError, MarketFeed};
use crate::market::Market;
use crate::table::RawTable;

/// Deterministic in-memory [`MarketFeed`] for engine and behavior tests.
///
/// Daily-bar responses are scripted as a one-shot queue with an optional
/// fallback for unscripted calls; listings and billboard snapshots are keyed
/// lookups. Anything not scripted answers with an empty table, never an
/// error, so tests opt in to every failure they exercise.
#[derive(Default)]
pub struct ScriptedFeed {
    daily: Mutex<VecDeque<Result<RawTable, FeedError>>>,
    default_daily: Mutex<Option<RawTable>>,
    listings: Mutex<HashMap<Market, RawTable>>,
    details: Mutex<HashMap<String, RawTable>>,
    daily_requests: Mutex<Vec<DailyBarsRequest>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of the next unconsumed daily-bars call.
    pub fn push_daily(&self, outcome: Result<RawTable, FeedError>) {
        self.daily
            .lock()
            .expect("scripted daily queue should not be poisoned")
            .push_back(outcome);
    }

    /// Table returned by daily-bars calls once the queue is drained.
    pub fn set_default_daily(&self, table: RawTable) {
        *self
            .default_daily
            .lock()
            .expect("scripted default should not be poisoned") = Some(table);
    }

    pub fn set_listing(&self, market: Market, table: RawTable) {
        self.listings
            .lock()
            .expect("scripted listings should not be poisoned")
            .insert(market, table);
    }

    pub fn set_detail(&self, date: Date, table: RawTable) {
        self.details
            .lock()
            .expect("scripted details should not be poisoned")
            .insert(dashed(date), table);
    }

    /// Every daily-bars request seen so far, in call order.
    pub fn daily_requests(&self) -> Vec<DailyBarsRequest> {
        self.daily_requests
            .lock()
            .expect("scripted request log should not be poisoned")
            .clone()
    }

    /// A minimal sniffable bar table with one synthetic row per date.
    pub fn bar_table(dates: &[&str]) -> RawTable {
        let mut table = RawTable::new(
            ["date", "open", "close", "high", "low", "volume", "amount"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        for (i, date) in dates.iter().enumerate() {
            let base = 10.0 + i as f64;
            table.push_row(vec![
                json!(date),
                json!(base),
                json!(base + 0.2),
                json!(base + 0.3),
                json!(base - 0.1),
                json!(1_000 + i as i64),
                json!(base * 10_000.0),
            ]);
        }
        table
    }

    /// A minimal sniffable exchange listing in the Chinese header dialect.
    pub fn listing_table(entries: &[(&str, &str, &str)]) -> RawTable {
        let mut table = RawTable::new(
            ["A股代码", "证券简称", "上市日期"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        for (code, name, listing_date) in entries {
            table.push_row(vec![json!(code), json!(name), json!(listing_date)]);
        }
        table
    }

    /// A billboard detail table in the Chinese header dialect.
    pub fn flow_table(entries: &[(&str, &str, f64, f64)]) -> RawTable {
        let mut table = RawTable::new(
            ["股票代码", "股票名称", "买入金额(万元)", "卖出金额(万元)"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        for (code, name, buy, sell) in entries {
            table.push_row(vec![json!(code), json!(name), json!(buy), json!(sell)]);
        }
        table
    }
}

impl MarketFeed for ScriptedFeed {
    fn id(&self) -> &'static str {
        "scripted"
    }

    fn daily_bars<'a>(
        &'a self,
        request: DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>> {
        self.daily_requests
            .lock()
            .expect("scripted request log should not be poisoned")
            .push(request);
        let outcome = self
            .daily
            .lock()
            .expect("scripted daily queue should not be poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Ok(self
                    .default_daily
                    .lock()
                    .expect("scripted default should not be poisoned")
                    .clone()
                    .unwrap_or_default())
            });
        Box::pin(async move { outcome })
    }

    fn security_list<'a>(
        &'a self,
        market: Market,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>> {
        let table = self
            .listings
            .lock()
            .expect("scripted listings should not be poisoned")
            .get(&market)
            .cloned()
            .unwrap_or_default();
        Box::pin(async move { Ok(table) })
    }

    fn institutional_detail<'a>(
        &'a self,
        date: Date,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FeedError>> + Send + 'a>> {
        let table = self
            .details
            .lock()
            .expect("scripted details should not be poisoned")
            .get(&dashed(date))
            .cloned()
            .unwrap_or_default();
        Box::pin(async move { Ok(table) })
    }
}
