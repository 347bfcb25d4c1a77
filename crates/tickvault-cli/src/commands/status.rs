//! `status`: queue and warehouse counts.

use std::process::ExitCode;

use tickvault_warehouse::{TaskFilter, TaskStatus, Warehouse};

use crate::error::CliError;

pub fn run(warehouse: &Warehouse) -> Result<ExitCode, CliError> {
    let store = warehouse.task_store()?;
    let session = warehouse.session()?;

    println!("tasks:");
    for status in TaskStatus::ALL {
        let count = store.count(&TaskFilter::with_status(status))?;
        println!("  {:<9} {count}", status.as_str());
    }
    println!("securities: {}", session.securities_count()?);
    println!("daily bars: {}", session.daily_bar_count()?);
    println!("flow rows:  {}", session.flow_row_count()?);
    Ok(ExitCode::SUCCESS)
}
