//! # Tickvault Warehouse
//!
//! DuckDB-backed sink and durable task queue for tickvault.
//!
//! ## Overview
//!
//! One embedded `DuckDB` file holds both the ingested market data and the
//! task queue coordinating the ingestion. The pool clones every handed-out
//! connection from a single root instance; migrations and column backfills
//! run once when the warehouse opens.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `ingest_tasks` | Durable task queue with priority and lifecycle timestamps |
//! | `securities` | Security basics keyed by code |
//! | `daily_bars` | Append-only daily OHLCV rows, one set per adjustment pass |
//! | `inst_flow` | Institutional flow aggregates (created by the flow task) |
//! | `schema_migrations` | Migration bookkeeping |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickvault_warehouse::{TaskFilter, Warehouse, WarehouseConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open(WarehouseConfig::default())?;
//!     let store = warehouse.task_store()?;
//!     let stored = store.count(&TaskFilter::default())?;
//!     println!("{stored} tasks in {}", warehouse.db_path().display());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod pool;
pub mod schema;
pub mod session;
pub mod tasks;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub use error::StoreError;
pub use pool::{ConnectionPool, PooledConnection};
pub use session::{BarRow, FlowRow, SecurityRecord, Session};
pub use tasks::{NewTask, TaskFilter, TaskRecord, TaskStatus, TaskStore};

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for tickvault data.
    pub tickvault_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle pooled connections.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::at(resolve_tickvault_home())
    }
}

impl WarehouseConfig {
    /// Configuration rooted at an explicit data directory.
    #[must_use]
    pub fn at(home: impl Into<PathBuf>) -> Self {
        let tickvault_home = home.into();
        let db_path = tickvault_home.join("tickvault.duckdb");
        Self {
            tickvault_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// The warehouse: connection pool plus schema lifecycle.
///
/// Cloning is cheap; every clone shares the pool.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    ///
    /// # Errors
    /// Returns an error when the data directory cannot be created or the
    /// database cannot be opened or migrated.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse, creating the data directory and applying schema
    /// migrations.
    ///
    /// # Errors
    /// Returns an error when the data directory cannot be created or the
    /// database cannot be opened or migrated.
    pub fn open(config: WarehouseConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply migrations and column backfills. Safe to call repeatedly.
    ///
    /// # Errors
    /// Returns an error when migration SQL is rejected.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let connection = self.pool.acquire()?;
        schema::apply_migrations(&connection)?;
        Ok(())
    }

    /// Path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Root data directory.
    #[must_use]
    pub fn home(&self) -> &Path {
        self.config.tickvault_home.as_path()
    }

    /// Task store over a fresh pooled connection.
    ///
    /// # Errors
    /// Returns an error when no connection can be acquired.
    pub fn task_store(&self) -> Result<TaskStore, StoreError> {
        Ok(TaskStore::new(self.pool.acquire()?))
    }

    /// Ingestion session over a fresh pooled connection.
    ///
    /// # Errors
    /// Returns an error when no connection can be acquired.
    pub fn session(&self) -> Result<Session, StoreError> {
        Ok(Session::new(self.pool.acquire()?))
    }
}

/// Resolve the tickvault home directory from environment or default.
fn resolve_tickvault_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKVAULT_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickvault");
    }

    PathBuf::from(".tickvault")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn probe_task(id: &str) -> NewTask {
        NewTask {
            task_id: id.to_string(),
            kind: String::from("daily_bars"),
            description: String::new(),
            params: String::from("{}"),
            priority: 0,
        }
    }

    #[test]
    fn open_creates_schema_and_reopen_keeps_data() {
        let temp = tempdir().expect("tempdir");
        let config = WarehouseConfig::at(temp.path().join("vault"));

        let warehouse = Warehouse::open(config.clone()).expect("warehouse open");
        let store = warehouse.task_store().expect("task store");
        store.insert(probe_task("persisted")).expect("insert");
        drop(store);
        drop(warehouse);

        let warehouse = Warehouse::open(config).expect("reopen");
        let store = warehouse.task_store().expect("task store");
        let record = store.get("persisted").expect("row survives reopen");
        assert_eq!(record.status, TaskStatus::Pending);
    }

    #[test]
    fn writes_are_visible_across_pooled_connections() {
        let temp = tempdir().expect("tempdir");
        let warehouse =
            Warehouse::open(WarehouseConfig::at(temp.path().join("vault"))).expect("open");

        let store_a = warehouse.task_store().expect("first store");
        let store_b = warehouse.task_store().expect("second store");
        store_a.insert(probe_task("shared")).expect("insert");

        // Both stores are clones of the same embedded instance.
        let seen = store_b.get("shared").expect("visible through second store");
        assert_eq!(seen.task_id, "shared");
    }
}
