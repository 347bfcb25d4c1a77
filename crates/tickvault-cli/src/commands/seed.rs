//! `seed`: populate securities and queue the daily-bar backlog.

use std::process::ExitCode;

use tickvault_core::EastmoneyFeed;
use tickvault_engine::{seed, Executor};
use tickvault_warehouse::Warehouse;

use crate::error::CliError;

pub async fn run(warehouse: &Warehouse) -> Result<ExitCode, CliError> {
    let store = warehouse.task_store()?;
    let session = warehouse.session()?;
    let feed = EastmoneyFeed::default();
    let executor = Executor::new(&store, &feed, &session);

    let added = seed::populate_securities(&feed, &session).await?;
    let queued = seed::seed_backlog(&executor, &session)?;

    println!("securities added: {added}");
    println!("tasks queued:     {queued}");
    Ok(ExitCode::SUCCESS)
}
