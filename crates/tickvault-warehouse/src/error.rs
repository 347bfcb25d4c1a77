//! Error taxonomy for the warehouse sink and the task store.

use thiserror::Error;

use crate::tasks::TaskStatus;

/// Errors that can occur during warehouse operations.
///
/// Statement and connection failures are task-level (`Unavailable`), never
/// process-fatal; the queue-shape errors carry enough context to act on.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The embedded database rejected a statement or the connection failed.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] duckdb::Error),

    /// Filesystem error while preparing the data directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A task row with this id already exists.
    #[error("task '{id}' already exists")]
    DuplicateId { id: String },

    /// No task row carries this id.
    #[error("task '{id}' not found")]
    NotFound { id: String },

    /// The requested status change is not reachable from the row's current
    /// status.
    #[error("illegal status transition {from} -> {to} for task '{id}'")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// A stored row no longer matches the shape the store expects.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}
