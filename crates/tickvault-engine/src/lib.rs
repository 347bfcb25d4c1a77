//! # Tickvault Engine
//!
//! Task generation, execution and worker orchestration for tickvault.
//!
//! ## Overview
//!
//! The engine sits between the provider contract in `tickvault-core` and the
//! durable queue and sink in `tickvault-warehouse`:
//!
//! - **Execution template** ([`Executor`]) stamps task ids, normalizes
//!   params, walks the status machine and absorbs body errors.
//! - **Task bodies** ([`jobs`]) do the actual ingestion: daily price bars
//!   and institutional billboard flow.
//! - **Seeding** ([`seed`]) populates securities on first run and queues the
//!   per-security daily-bar backlog.
//! - **Worker controllers** ([`WorkerController`]) drain the backlog
//!   claim-first, with cooperative pause and stop.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`controller`] | Background drain loops with pause/stop and progress snapshots |
//! | [`error`] | Engine-level errors |
//! | [`executor`] | Task generation and the execution template |
//! | [`jobs`] | Task bodies, dispatched by kind |
//! | [`params`] | Params normalization and tolerant readers |
//! | [`seed`] | Securities population and backlog seeding |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tickvault_core::EastmoneyFeed;
//! use tickvault_engine::{ControllerMode, WorkerController};
//! use tickvault_warehouse::Warehouse;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let feed = Arc::new(EastmoneyFeed::default());
//!     let controller = WorkerController::new(warehouse, feed, ControllerMode::FullRefresh);
//!     controller.start();
//!     controller.join().await;
//!     println!("{:?}", controller.status());
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod params;
pub mod seed;

// Re-export the operational surface at the crate root

pub use controller::{ControllerMode, ControllerStatus, WorkerController};
pub use error::EngineError;
pub use executor::{Executor, TaskDef};
pub use jobs::RunContext;
