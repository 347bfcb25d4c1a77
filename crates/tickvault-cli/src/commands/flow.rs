//! `flow`: queue and immediately run one institutional-flow aggregation.

use std::process::ExitCode;

use serde_json::json;
use tickvault_core::EastmoneyFeed;
use tickvault_engine::{jobs, Executor, TaskDef};
use tickvault_warehouse::Warehouse;

use crate::cli::FlowArgs;
use crate::error::CliError;

pub async fn run(warehouse: &Warehouse, args: &FlowArgs) -> Result<ExitCode, CliError> {
    let store = warehouse.task_store()?;
    let session = warehouse.session()?;
    let feed = EastmoneyFeed::default();
    let executor = Executor::new(&store, &feed, &session);

    let mut params = json!({
        "codes": args.codes,
        "query_type": args.query_type,
    });
    if let Some(end_date) = &args.end_date {
        params["end_date"] = json!(end_date);
    }

    let task_id = executor.generate(&TaskDef {
        kind: jobs::INST_FLOW.to_string(),
        description: format!("Aggregate institutional flow for {}", args.codes.join(", ")),
        params,
        priority: 0,
    })?;
    println!("task {task_id}");

    let task = store.get(&task_id)?;
    if executor.execute(&task).await {
        println!("succeeded");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("failed");
        Ok(ExitCode::from(3))
    }
}
