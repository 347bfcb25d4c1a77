//! CLI argument definitions for tickvault.
//!
//! The binary is the operator surface over the task queue and the ingestion
//! workers: it seeds the backlog, drives refresh/drain runs, fires one-shot
//! flow aggregations and inspects or repairs the queue.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `seed` | Populate securities (when empty) and queue the daily-bar backlog |
//! | `refresh` | Full refresh: seed, then drain the daily-bar backlog |
//! | `drain` | Drain pending tasks of any kind, no reseeding |
//! | `flow` | Aggregate institutional billboard flow over a trailing window |
//! | `tasks` | Task queue inspection and repair |
//! | `status` | Queue and warehouse counts |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--home` | `TICKVAULT_HOME`, else `~/.tickvault` | Data directory |
//! | `--verbose` | `false` | Debug-level logging |
//!
//! # Examples
//!
//! ```bash
//! # Refresh the whole daily-bar history (Ctrl-C stops after the in-flight task)
//! tickvault refresh
//!
//! # Ten-day institutional flow for two codes
//! tickvault flow 600000,000001 --query-type 10
//!
//! # Inspect the backlog
//! tickvault tasks list --status pending --limit 20
//!
//! # Release tasks stuck Running for over an hour
//! tickvault tasks recover --older-than 3600 --requeue
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Market-data ingestion orchestrator.
///
/// Downloads daily bars and institutional flow aggregates from the provider
/// into an embedded DuckDB warehouse, coordinated through a durable,
/// priority-ordered task queue.
#[derive(Debug, Parser)]
#[command(
    name = "tickvault",
    version,
    about = "Market-data ingestion orchestrator"
)]
pub struct Cli {
    /// Data directory holding the warehouse database.
    ///
    /// Defaults to `TICKVAULT_HOME`, then `~/.tickvault`.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Log everything at debug level (overrides `TICKVAULT_LOG`).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Populate securities (when empty) and queue one daily-bar task per
    /// security.
    ///
    /// # Examples
    ///
    ///   tickvault seed
    Seed,

    /// Full refresh: seed, then drain the daily-bar backlog.
    ///
    /// Progress prints once a second; Ctrl-C stops after the in-flight task.
    ///
    /// # Examples
    ///
    ///   tickvault refresh
    Refresh,

    /// Drain pending tasks of any kind without reseeding.
    ///
    /// # Examples
    ///
    ///   tickvault drain
    Drain,

    /// Aggregate institutional billboard flow for codes over a trailing
    /// window.
    ///
    /// Generates an aggregation task and executes it immediately.
    ///
    /// # Examples
    ///
    ///   tickvault flow 600000
    ///   tickvault flow 600000,000001 --query-type 10
    Flow(FlowArgs),

    /// Task queue inspection and repair.
    Tasks(TasksArgs),

    /// Queue and warehouse counts.
    Status,
}

/// Arguments for the `flow` command.
#[derive(Debug, Args)]
pub struct FlowArgs {
    /// Security codes, comma-separated.
    #[arg(required = true, num_args = 1.., value_delimiter = ',')]
    pub codes: Vec<String>,

    /// Trailing window in days (5, 10, 30 or 60).
    #[arg(long, default_value_t = 5)]
    pub query_type: i64,

    /// Window end date, `YYYYMMDD` or `YYYY-MM-DD`; defaults to today.
    #[arg(long)]
    pub end_date: Option<String>,
}

/// Arguments for the `tasks` command group.
#[derive(Debug, Args)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: TasksCommand,
}

/// Task queue subcommands.
#[derive(Debug, Subcommand)]
pub enum TasksCommand {
    /// List tasks in drain order (priority, then insertion).
    List(TasksListArgs),

    /// Show one task as JSON.
    Show(TaskIdArg),

    /// Cancel a pending task.
    Cancel(TaskIdArg),

    /// Move tasks stuck in Running to Retrying.
    ///
    /// Never runs automatically; sweep after a crashed or killed worker.
    Recover(RecoverArgs),

    /// Release a Retrying task back to Pending for a fresh cycle.
    Requeue(TaskIdArg),
}

/// Arguments for `tasks list`.
#[derive(Debug, Args)]
pub struct TasksListArgs {
    /// Keep only tasks with this status (e.g. pending, failed).
    #[arg(long)]
    pub status: Option<String>,

    /// Keep only tasks of this kind (e.g. daily_bars).
    #[arg(long)]
    pub kind: Option<String>,

    /// Maximum number of tasks to print.
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Tasks to skip from the front of the drain order.
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

/// A single task-id argument.
#[derive(Debug, Args)]
pub struct TaskIdArg {
    /// Task id (32 hex characters).
    pub task_id: String,
}

/// Arguments for `tasks recover`.
#[derive(Debug, Args)]
pub struct RecoverArgs {
    /// Recover tasks that have been Running longer than this many seconds.
    #[arg(long)]
    pub older_than: u64,

    /// Also release the recovered tasks straight back to Pending.
    #[arg(long, default_value_t = false)]
    pub requeue: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn clap_definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flow_codes_split_on_commas() {
        let cli = Cli::parse_from(["tickvault", "flow", "600000,000001", "--query-type", "10"]);
        match cli.command {
            Command::Flow(args) => {
                assert_eq!(args.codes, vec!["600000", "000001"]);
                assert_eq!(args.query_type, 10);
                assert_eq!(args.end_date, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
