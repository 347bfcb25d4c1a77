mod flow;
mod refresh;
mod seed;
mod status;
mod tasks;

use std::process::ExitCode;

use tickvault_engine::ControllerMode;
use tickvault_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let warehouse = open_warehouse(cli)?;

    match &cli.command {
        Command::Seed => seed::run(&warehouse).await,
        Command::Refresh => refresh::run(&warehouse, ControllerMode::FullRefresh).await,
        Command::Drain => refresh::run(&warehouse, ControllerMode::DrainOnly).await,
        Command::Flow(args) => flow::run(&warehouse, args).await,
        Command::Tasks(args) => tasks::run(&warehouse, args),
        Command::Status => status::run(&warehouse),
    }
}

/// Opening the warehouse also creates the data directory and applies
/// pending migrations, so every command starts from a usable schema.
fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.home {
        Some(home) => WarehouseConfig::at(home),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}
