//! Engine-level errors.

use thiserror::Error;

use tickvault_core::FeedError;
use tickvault_warehouse::StoreError;

/// Failures surfaced outside a task cycle: generation, seeding, run setup.
///
/// Task bodies report trouble by returning `false` or an error the execution
/// template converts into a `Failed` status; nothing a body does escapes as
/// an `EngineError` into the worker loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The durable store rejected or lost an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The provider failed outside a per-day or per-pass isolation point.
    #[error(transparent)]
    Feed(#[from] FeedError),
}
