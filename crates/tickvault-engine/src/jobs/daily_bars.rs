//! Daily-bar ingestion body.
//!
//! Fetches one provider table per (code, adjustment pass), maps its drifting
//! column names, coerces cells tolerantly and appends the rows. A failed
//! pass is logged and skipped, never aborts the rest; the task succeeds iff
//! anything at all was saved.

use tracing::{info, warn};

use tickvault_core::sniff::BarColumns;
use tickvault_core::{coerce, dates, Adjust, DailyBarsRequest, Market};
use tickvault_warehouse::BarRow;

use crate::error::EngineError;
use crate::jobs::{cell_number, RunContext};
use crate::params;

/// Earliest trade date the provider serves; used when a task carries none.
const DEFAULT_START: &str = "19900101";

pub async fn run(context: &RunContext<'_>) -> Result<bool, EngineError> {
    let codes = params::code_list(&context.params);
    if codes.is_empty() {
        warn!("daily-bar task carries no codes");
        return Ok(false);
    }

    let market =
        params::text_param(&context.params, "market").and_then(|value| match Market::parse(&value) {
            Ok(market) => Some(market),
            Err(error) => {
                warn!(%error, "ignoring unusable market parameter");
                None
            }
        });
    let start = params::text_param(&context.params, "start_date")
        .unwrap_or_else(|| DEFAULT_START.to_string());
    let end = params::text_param(&context.params, "end_date")
        .unwrap_or_else(|| dates::compact(dates::today()));
    let adjust = params::text_param(&context.params, "adjust").unwrap_or_default();
    let passes = match Adjust::expand(&adjust) {
        Ok(passes) => passes,
        Err(error) => {
            warn!(%error, "daily-bar task carries an unusable adjust");
            return Ok(false);
        }
    };

    let mut saved = 0usize;
    let mut failed_passes = 0usize;
    for code in &codes {
        for pass in &passes {
            match ingest_pass(context, code, market, &start, &end, *pass).await {
                Ok(rows) => saved += rows,
                Err(error) => {
                    failed_passes += 1;
                    warn!(code, adjust = pass.wire(), %error, "daily-bar pass failed");
                }
            }
        }
    }

    info!(
        codes = codes.len(),
        failed_passes, saved, "daily-bar ingestion finished"
    );
    Ok(saved > 0)
}

async fn ingest_pass(
    context: &RunContext<'_>,
    code: &str,
    market: Option<Market>,
    start: &str,
    end: &str,
    adjust: Adjust,
) -> Result<usize, EngineError> {
    let request = DailyBarsRequest::new(code, market, start, end, adjust)?;
    let table = context.feed.daily_bars(request).await?;
    if table.is_empty() {
        return Ok(0);
    }
    let Some(columns) = BarColumns::sniff(&table.columns) else {
        warn!(code, "bar table has no recognizable date column");
        return Ok(0);
    };

    let mut rows = Vec::with_capacity(table.len());
    for row in &table.rows {
        // Rows without a readable trade date are dropped, not nulled.
        let Some(date) = row
            .get(columns.date)
            .and_then(coerce::text)
            .and_then(|text| dates::parse_flex(&text).ok())
        else {
            continue;
        };
        rows.push(BarRow {
            code: code.to_string(),
            trade_date: dates::dashed(date),
            adjust: adjust.wire().to_string(),
            open: cell_number(row, columns.open),
            close: cell_number(row, columns.close),
            high: cell_number(row, columns.high),
            low: cell_number(row, columns.low),
            volume: columns
                .volume
                .and_then(|index| row.get(index))
                .and_then(coerce::integer),
            amount: cell_number(row, columns.amount),
            turnover: cell_number(row, columns.turnover),
            outstanding_share: cell_number(row, columns.outstanding_share),
        });
    }
    if rows.is_empty() {
        return Ok(0);
    }
    Ok(context.session.insert_daily_bars(&rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use tickvault_core::{FeedError, ScriptedFeed};
    use tickvault_warehouse::{Warehouse, WarehouseConfig};
    use time::macros::date;

    fn open_warehouse(dir: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig::at(dir.path())).expect("warehouse should open")
    }

    #[tokio::test]
    async fn saves_bars_and_reports_success() {
        let dir = tempdir().expect("tempdir should be creatable");
        let warehouse = open_warehouse(&dir);
        let session = warehouse.session().expect("session should open");
        let feed = ScriptedFeed::new();
        feed.set_default_daily(ScriptedFeed::bar_table(&["2024-01-05", "2024-01-08"]));

        let context = RunContext {
            feed: &feed,
            session: &session,
            params: json!({ "code": "600000", "adjust": "" }),
        };
        assert!(run(&context).await.expect("body should not error"));
        assert_eq!(session.daily_bar_count().expect("count should read"), 2);
    }

    #[tokio::test]
    async fn all_expands_to_one_pass_per_adjust_mode() {
        let dir = tempdir().expect("tempdir should be creatable");
        let warehouse = open_warehouse(&dir);
        let session = warehouse.session().expect("session should open");
        let feed = ScriptedFeed::new();
        feed.set_default_daily(ScriptedFeed::bar_table(&["2024-01-05"]));

        let context = RunContext {
            feed: &feed,
            session: &session,
            params: json!({ "code": "600000", "adjust": "all" }),
        };
        assert!(run(&context).await.expect("body should not error"));

        let requests = feed.daily_requests();
        assert_eq!(requests.len(), 3);
        let adjusts: Vec<Adjust> = requests.iter().map(|r| r.adjust).collect();
        assert_eq!(adjusts, Adjust::PASSES.to_vec());
        assert_eq!(session.daily_bar_count().expect("count should read"), 3);
    }

    #[tokio::test]
    async fn a_failing_pass_does_not_abort_the_rest() {
        let dir = tempdir().expect("tempdir should be creatable");
        let warehouse = open_warehouse(&dir);
        let session = warehouse.session().expect("session should open");
        let feed = ScriptedFeed::new();
        feed.push_daily(Err(FeedError::unavailable("scripted outage")));
        feed.set_default_daily(ScriptedFeed::bar_table(&["2024-01-05"]));

        let context = RunContext {
            feed: &feed,
            session: &session,
            params: json!({ "code": "600000", "adjust": "all" }),
        };
        assert!(run(&context).await.expect("body should not error"));
        assert_eq!(session.daily_bar_count().expect("count should read"), 2);
    }

    #[tokio::test]
    async fn nothing_saved_means_failure_without_error() {
        let dir = tempdir().expect("tempdir should be creatable");
        let warehouse = open_warehouse(&dir);
        let session = warehouse.session().expect("session should open");
        let feed = ScriptedFeed::new();

        let empty = RunContext {
            feed: &feed,
            session: &session,
            params: json!({ "code": "600000" }),
        };
        assert!(!run(&empty).await.expect("empty feed should not error"));

        let no_codes = RunContext {
            feed: &feed,
            session: &session,
            params: json!({}),
        };
        assert!(!run(&no_codes).await.expect("missing codes should not error"));
    }

    #[tokio::test]
    async fn dates_default_to_the_full_history_window() {
        let dir = tempdir().expect("tempdir should be creatable");
        let warehouse = open_warehouse(&dir);
        let session = warehouse.session().expect("session should open");
        let feed = ScriptedFeed::new();
        feed.set_default_daily(ScriptedFeed::bar_table(&["2024-01-05"]));

        let context = RunContext {
            feed: &feed,
            session: &session,
            params: json!({ "code": "600000", "market": "SH" }),
        };
        assert!(run(&context).await.expect("body should not error"));

        let request = &feed.daily_requests()[0];
        assert_eq!(request.start, date!(1990 - 01 - 01));
        assert_eq!(request.end, dates::today());
        assert_eq!(request.market, Some(Market::Sh));
    }
}
