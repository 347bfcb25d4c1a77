//! Task generation and the execution template.
//!
//! [`Executor`] is the one place a task's lifecycle is driven: it stamps the
//! id, normalizes params, walks the status transitions and dispatches to the
//! body for the task's kind. It is also the sole error boundary. A body
//! error becomes a `Failed` status and a log line, never a worker-loop
//! crash.

use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use tickvault_core::MarketFeed;
use tickvault_warehouse::{NewTask, Session, TaskRecord, TaskStatus, TaskStore};

use crate::error::EngineError;
use crate::jobs::{self, RunContext};
use crate::params;

/// Blueprint for a task row; the id is stamped at generation time.
#[derive(Debug, Clone)]
pub struct TaskDef {
    pub kind: String,
    pub description: String,
    pub params: Value,
    pub priority: i64,
}

/// Drives task lifecycles over one run's store, feed and sink session.
pub struct Executor<'a> {
    store: &'a TaskStore,
    feed: &'a dyn MarketFeed,
    session: &'a Session,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a TaskStore, feed: &'a dyn MarketFeed, session: &'a Session) -> Self {
        Self {
            store,
            feed,
            session,
        }
    }

    /// Inserts a fresh `Pending` task from a blueprint and returns its id.
    ///
    /// # Errors
    ///
    /// Fails when the store rejects the insert.
    pub fn generate(&self, def: &TaskDef) -> Result<String, EngineError> {
        let task_id = Uuid::new_v4().simple().to_string();
        self.store.insert(NewTask {
            task_id: task_id.clone(),
            kind: def.kind.clone(),
            description: def.description.clone(),
            params: params::normalize_params(&def.params),
            priority: def.priority,
        })?;
        debug!(%task_id, kind = %def.kind, "task generated");
        Ok(task_id)
    }

    /// Generates a task and immediately runs it through the template.
    pub async fn execute_def(&self, def: &TaskDef) -> bool {
        let task_id = match self.generate(def) {
            Ok(task_id) => task_id,
            Err(error) => {
                error!(kind = %def.kind, %error, "task generation failed");
                return false;
            }
        };
        let record = match self.store.get(&task_id) {
            Ok(record) => record,
            Err(error) => {
                error!(%task_id, %error, "generated task did not read back");
                return false;
            }
        };
        self.execute(&record).await
    }

    /// Runs one task through `Running` to a terminal status. Returns whether
    /// the body reported success.
    pub async fn execute(&self, task: &TaskRecord) -> bool {
        self.mark(&task.task_id, TaskStatus::Running);

        let context = RunContext {
            feed: self.feed,
            session: self.session,
            params: params::parse_params(&task.params),
        };
        let outcome = match task.kind.as_str() {
            jobs::DAILY_BARS => jobs::daily_bars::run(&context).await,
            jobs::INST_FLOW => jobs::inst_flow::run(&context).await,
            other => {
                warn!(task_id = %task.task_id, kind = other, "unknown task kind");
                Ok(false)
            }
        };
        let success = match outcome {
            Ok(success) => success,
            Err(error) => {
                error!(task_id = %task.task_id, kind = %task.kind, %error, "task body failed");
                false
            }
        };

        let terminal = if success {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        };
        self.mark(&task.task_id, terminal);
        success
    }

    // Status bookkeeping never takes a task down with it: a failed update is
    // loud in the log and the recovery sweep covers the stuck-Running case.
    fn mark(&self, task_id: &str, status: TaskStatus) {
        if let Err(error) = self.store.update_status(task_id, status) {
            error!(task_id, %status, %error, "status update failed");
        }
    }
}
