//! First-run securities population and backlog seeding.
//!
//! A full refresh starts from the securities table: when it is empty it is
//! filled from the provider's per-exchange listings, then one `daily_bars`
//! task per security goes onto the backlog. Reseeding on every refresh is
//! intentional, the ingestion side is append-only and duplicate-tolerant.

use serde_json::json;
use tracing::{info, warn};

use tickvault_core::sniff::ListingColumns;
use tickvault_core::{coerce, dates, Market, MarketFeed};
use tickvault_warehouse::{SecurityRecord, Session};

use crate::error::EngineError;
use crate::executor::{Executor, TaskDef};
use crate::jobs::{self, cell_text};

/// Start-of-history floor for securities missing a listing date.
const LISTING_FLOOR: &str = "19841118";

/// Fills the securities table from the provider's per-exchange listings,
/// only when it is empty. Returns how many rows were added.
///
/// A listing that fails to fetch or sniff skips its exchange; the other
/// exchanges still populate.
///
/// # Errors
///
/// Fails when the store rejects a batch.
pub async fn populate_securities(
    feed: &dyn MarketFeed,
    session: &Session,
) -> Result<usize, EngineError> {
    if session.securities_count()? > 0 {
        return Ok(0);
    }

    let mut added = 0usize;
    for market in Market::ALL {
        let table = match feed.security_list(market).await {
            Ok(table) => table,
            Err(error) => {
                warn!(market = market.as_str(), %error, "listing fetch failed");
                continue;
            }
        };
        if table.is_empty() {
            continue;
        }
        let Some(columns) = ListingColumns::sniff(&table.columns) else {
            warn!(
                market = market.as_str(),
                "listing table has no recognizable code column"
            );
            continue;
        };

        let mut records = Vec::with_capacity(table.len());
        for row in &table.rows {
            let Some(code) = row.get(columns.code).and_then(coerce::text) else {
                continue;
            };
            records.push(SecurityRecord {
                code,
                name: cell_text(row, columns.name).unwrap_or_default(),
                company_name: cell_text(row, columns.company_name).unwrap_or_default(),
                market: market.as_str().to_string(),
                listing_date: cell_text(row, columns.listing_date)
                    .and_then(|text| dates::parse_flex(&text).ok())
                    .map(dates::dashed),
            });
        }
        added += session.insert_securities(&records)?;
    }

    info!(added, "securities table populated");
    Ok(added)
}

/// Seeds one `daily_bars` backlog task per security. The start date falls
/// back from the listing date to the floor; the body picks its own end date
/// at execution time.
///
/// # Errors
///
/// Fails when the store rejects an insert.
pub fn seed_backlog(executor: &Executor<'_>, session: &Session) -> Result<usize, EngineError> {
    let securities = session.list_securities()?;
    let mut seeded = 0usize;
    for security in &securities {
        let start = security
            .listing_date
            .as_deref()
            .and_then(|text| dates::parse_flex(text).ok())
            .map(dates::compact)
            .unwrap_or_else(|| LISTING_FLOOR.to_string());
        executor.generate(&TaskDef {
            kind: jobs::DAILY_BARS.to_string(),
            description: format!("Download daily data for {}", security.code),
            params: json!({
                "code": security.code,
                "market": security.market,
                "start_date": start,
                "adjust": "all",
            }),
            priority: 0,
        })?;
        seeded += 1;
    }
    info!(seeded, "daily-bar backlog seeded");
    Ok(seeded)
}
