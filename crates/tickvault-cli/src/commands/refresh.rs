//! `refresh` and `drain`: drive a worker controller to completion.
//!
//! Both commands share this driver; only the controller mode differs.
//! Progress prints to stderr once a second, Ctrl-C requests a cooperative
//! stop, and the summary prints after the in-flight task has finished.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tickvault_core::EastmoneyFeed;
use tickvault_engine::{ControllerMode, WorkerController};
use tickvault_warehouse::Warehouse;

use crate::error::CliError;

pub async fn run(warehouse: &Warehouse, mode: ControllerMode) -> Result<ExitCode, CliError> {
    let feed = Arc::new(EastmoneyFeed::default());
    let controller = Arc::new(WorkerController::new(warehouse.clone(), feed, mode));
    controller.start();

    let stopper = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("stopping after the in-flight task...");
                controller.stop();
            }
        })
    };
    let progress = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let status = controller.status();
                if !status.running {
                    break;
                }
                let processed = status.done + status.failed;
                match &status.current {
                    Some(current) => eprintln!(
                        "{processed}/{} done, {} failed - {current}",
                        status.total, status.failed
                    ),
                    None => eprintln!(
                        "{processed}/{} done, {} failed",
                        status.total, status.failed
                    ),
                }
            }
        })
    };

    controller.join().await;
    stopper.abort();
    progress.abort();

    let status = controller.status();
    let processed = status.done + status.failed;
    println!(
        "processed {processed}/{} tasks, {} failed{}",
        status.total,
        status.failed,
        if status.stopped_by_request {
            " (stopped)"
        } else {
            ""
        }
    );
    Ok(ExitCode::SUCCESS)
}
