//! Institutional billboard flow aggregation body.
//!
//! Walks every day of a trailing window, sniffs the drifting columns of the
//! billboard detail table and accumulates buy/sell totals per requested
//! code. One snapshot row per code that appeared lands in `inst_flow`,
//! tagged with the window length and today's ingest date.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use tickvault_core::sniff::FlowColumns;
use tickvault_core::{coerce, dates, RawTable};
use tickvault_warehouse::FlowRow;

use crate::error::EngineError;
use crate::jobs::{cell_number, cell_text, RunContext};
use crate::params;

/// Window lengths the provider's billboard endpoint understands, in days.
const WINDOWS: [i64; 4] = [5, 10, 30, 60];

const DEFAULT_WINDOW: i64 = 5;

#[derive(Default)]
struct FlowTotals {
    seen: bool,
    name: String,
    buy_amount: f64,
    buy_count: i64,
    sell_amount: f64,
    sell_count: i64,
    net_amount: f64,
}

pub async fn run(context: &RunContext<'_>) -> Result<bool, EngineError> {
    let codes = params::code_list(&context.params);
    if codes.is_empty() {
        warn!("flow task carries no codes");
        return Ok(false);
    }

    let window = match params::int_param(&context.params, "query_type") {
        Some(days) if WINDOWS.contains(&days) => days,
        Some(days) => {
            warn!(query_type = days, "unsupported window, using {DEFAULT_WINDOW} days");
            DEFAULT_WINDOW
        }
        None => DEFAULT_WINDOW,
    };
    let end = match params::text_param(&context.params, "end_date") {
        Some(raw) => match dates::parse_flex(&raw) {
            Ok(date) => date,
            Err(error) => {
                warn!(%error, "flow task carries an unusable end_date");
                return Ok(false);
            }
        },
        None => dates::today(),
    };
    let start = dates::window_start(end, window);

    let mut totals: HashMap<&str, FlowTotals> = codes
        .iter()
        .map(|code| (code.as_str(), FlowTotals::default()))
        .collect();

    let mut day = start;
    loop {
        match context.feed.institutional_detail(day).await {
            Ok(table) if table.is_empty() => {
                debug!(date = %dates::dashed(day), "no billboard detail");
            }
            Ok(table) => accumulate(&table, &mut totals),
            Err(error) => {
                warn!(date = %dates::dashed(day), %error, "billboard detail fetch failed");
            }
        }
        if day >= end {
            break;
        }
        let Some(next) = day.next_day() else { break };
        day = next;
    }

    let ingest_date = dates::dashed(dates::today());
    let rows: Vec<FlowRow> = codes
        .iter()
        .filter_map(|code| {
            let entry = totals.get(code.as_str())?;
            if !entry.seen {
                return None;
            }
            Some(FlowRow {
                ingest_date: ingest_date.clone(),
                code: code.clone(),
                name: entry.name.clone(),
                buy_amount: entry.buy_amount,
                buy_count: entry.buy_count,
                sell_amount: entry.sell_amount,
                sell_count: entry.sell_count,
                net_amount: entry.net_amount,
                window,
            })
        })
        .collect();

    if rows.is_empty() {
        info!(codes = codes.len(), window, "no billboard appearances in the window");
        return Ok(false);
    }

    context.session.ensure_flow_table()?;
    let written = context.session.insert_flow_rows(&rows)?;
    info!(written, window, "flow snapshot appended");
    Ok(true)
}

fn accumulate(table: &RawTable, totals: &mut HashMap<&str, FlowTotals>) {
    let Some(columns) = FlowColumns::sniff(&table.columns) else {
        warn!("billboard table has no recognizable code column");
        return;
    };
    for row in &table.rows {
        let Some(code) = row.get(columns.code).and_then(coerce::text) else {
            continue;
        };
        let Some(entry) = totals.get_mut(code.as_str()) else {
            continue;
        };
        let buy = cell_number(row, columns.buy).unwrap_or(0.0);
        let sell = cell_number(row, columns.sell).unwrap_or(0.0);
        entry.seen = true;
        entry.buy_amount += buy;
        entry.sell_amount += sell;
        // A missing or unreadable net falls back to the buy/sell difference;
        // an explicit zero is kept as reported.
        entry.net_amount += cell_number(row, columns.net).unwrap_or(buy - sell);
        if buy > 0.0 {
            entry.buy_count += 1;
        }
        if sell > 0.0 {
            entry.sell_count += 1;
        }
        if let Some(name) = cell_text(row, columns.name) {
            entry.name = name;
        }
    }
}
