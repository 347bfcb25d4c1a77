//! `tasks`: queue inspection and repair.

use std::process::ExitCode;
use std::time::Duration;

use tickvault_warehouse::{TaskFilter, TaskRecord, TaskStatus, Warehouse};

use crate::cli::{TasksArgs, TasksCommand};
use crate::error::CliError;

pub fn run(warehouse: &Warehouse, args: &TasksArgs) -> Result<ExitCode, CliError> {
    let store = warehouse.task_store()?;
    match &args.command {
        TasksCommand::List(args) => {
            let filter = TaskFilter {
                status: parse_status(args.status.as_deref())?,
                kind: args.kind.clone(),
            };
            let tasks = store.list(&filter, args.limit, args.offset)?;
            if tasks.is_empty() {
                println!("no tasks");
                return Ok(ExitCode::SUCCESS);
            }
            for task in &tasks {
                println!("{}", task_line(task));
            }
        }
        TasksCommand::Show(args) => {
            let task = store.get(&args.task_id)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TasksCommand::Cancel(args) => {
            store.cancel(&args.task_id)?;
            println!("cancelled {}", args.task_id);
        }
        TasksCommand::Recover(args) => {
            let recovered = store.recover_stuck(Duration::from_secs(args.older_than))?;
            if recovered.is_empty() {
                println!("nothing to recover");
                return Ok(ExitCode::SUCCESS);
            }
            for task_id in &recovered {
                if args.requeue {
                    store.requeue(task_id)?;
                    println!("requeued {task_id}");
                } else {
                    println!("recovered {task_id}");
                }
            }
        }
        TasksCommand::Requeue(args) => {
            store.requeue(&args.task_id)?;
            println!("requeued {}", args.task_id);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn task_line(task: &TaskRecord) -> String {
    format!(
        "{}  {:<9}  {:<11}  {}",
        task.task_id,
        task.status.as_str(),
        task.kind,
        task.description,
    )
}

fn parse_status(value: Option<&str>) -> Result<Option<TaskStatus>, CliError> {
    value
        .map(|value| {
            TaskStatus::parse(value)
                .ok_or_else(|| CliError::InvalidArgument(format!("unknown status '{value}'")))
        })
        .transpose()
}
