//! Task bodies.
//!
//! A body is an async function from a [`RunContext`] to
//! `Result<bool, EngineError>`: `Ok(true)` means the task saved something,
//! `Ok(false)` means it finished without saving anything, `Err` means it hit
//! a failure its internal isolation points could not absorb. The execution
//! template maps all three onto the task's terminal status.

pub mod daily_bars;
pub mod inst_flow;

use serde_json::Value;

use tickvault_core::{coerce, MarketFeed};
use tickvault_warehouse::Session;

/// Task kind ingesting daily price bars.
pub const DAILY_BARS: &str = "daily_bars";

/// Task kind aggregating institutional billboard flow.
pub const INST_FLOW: &str = "inst_flow";

/// Everything a body runs against: the provider, the run's sink session and
/// the task's parsed params.
pub struct RunContext<'a> {
    pub feed: &'a dyn MarketFeed,
    pub session: &'a Session,
    pub params: Value,
}

pub(crate) fn cell_number(row: &[Value], index: Option<usize>) -> Option<f64> {
    index.and_then(|index| row.get(index)).and_then(coerce::number)
}

pub(crate) fn cell_text(row: &[Value], index: Option<usize>) -> Option<String> {
    index.and_then(|index| row.get(index)).and_then(coerce::text)
}
