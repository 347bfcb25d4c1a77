//! Durable task queue persisted in `ingest_tasks`.
//!
//! The store is the single authority on the task state machine. Every status
//! change is one conditional `UPDATE` whose `WHERE` clause encodes the allowed
//! source statuses, so an illegal transition simply affects zero rows and is
//! reported, never applied.
//!
//! ## Transitions
//!
//! | into | from |
//! |------|------|
//! | `Running` | `Pending`, `Running` (timestamp no-op on re-entry) |
//! | `Succeeded` / `Failed` | `Running` |
//! | `Cancelled` | `Pending` |
//! | `Retrying` | any |
//! | `Pending` | `Retrying` (requeue; clears both timestamps) |
//!
//! `started_at` is stamped once per execution cycle on the first entry into
//! `Running`, `ended_at` once on the first entry into a terminal status.

use std::fmt;
use std::time::Duration;

use duckdb::types::{ToSqlOutput, ValueRef};
use duckdb::ToSql;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::pool::PooledConnection;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a task row, stored as its exact variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Retrying,
}

impl TaskStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Succeeded,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
        TaskStatus::Retrying,
    ];

    /// The label stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Running => "Running",
            TaskStatus::Succeeded => "Succeeded",
            TaskStatus::Failed => "Failed",
            TaskStatus::Cancelled => "Cancelled",
            TaskStatus::Retrying => "Retrying",
        }
    }

    /// Parse a status label; accepts any casing.
    #[must_use]
    pub fn parse(value: &str) -> Option<TaskStatus> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Whether this status closes a task's execution cycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Text(
            self.as_str().as_bytes(),
        )))
    }
}

// ============================================================================
// Records
// ============================================================================

/// Input for inserting a fresh task row; status always starts at `Pending`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_id: String,
    pub kind: String,
    pub description: String,
    /// Canonical JSON blob; callers normalize before insert.
    pub params: String,
    pub priority: i64,
}

/// A task row as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub kind: String,
    pub description: String,
    pub params: String,
    pub priority: i64,
    pub status: TaskStatus,
    /// Store-assigned insertion-order tiebreaker.
    pub seq: i64,
    /// Timestamps rendered by the database as text; `None` where the cycle
    /// has not reached them.
    pub created_at: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

/// Optional constraints for `list` and `count`.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub kind: Option<String>,
}

impl TaskFilter {
    /// Filter down to a single status.
    #[must_use]
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            kind: None,
        }
    }
}

// ============================================================================
// Store
// ============================================================================

const TASK_COLUMNS: &str = "task_id, kind, description, params, priority, status, seq, \
     CAST(created_at AS VARCHAR), CAST(started_at AS VARCHAR), CAST(ended_at AS VARCHAR)";

/// Task queue operations over one pooled warehouse connection.
///
/// Stores are cheap: controllers hold one for the length of a run and
/// operator commands open short-lived ones.
pub struct TaskStore {
    connection: PooledConnection,
}

impl TaskStore {
    pub(crate) fn new(connection: PooledConnection) -> Self {
        Self { connection }
    }

    /// Insert a fresh task with status `Pending`.
    ///
    /// # Errors
    /// `DuplicateId` when a row with the same id already exists;
    /// `Unavailable` when the database rejects a statement.
    pub fn insert(&self, task: NewTask) -> Result<(), StoreError> {
        let existing: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM ingest_tasks WHERE task_id = ?",
            [task.task_id.as_str()],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(StoreError::DuplicateId { id: task.task_id });
        }

        let params: [&dyn ToSql; 5] = [
            &task.task_id,
            &task.kind,
            &task.description,
            &task.params,
            &task.priority,
        ];
        self.connection.execute(
            "INSERT INTO ingest_tasks (task_id, kind, description, params, priority, status) \
             VALUES (?, ?, ?, ?, ?, 'Pending')",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Apply one status transition through the store's conditional updates.
    ///
    /// # Errors
    /// `NotFound` when no row has the id; `InvalidTransition` when the row is
    /// in a status the target cannot be reached from. Neither outcome is ever
    /// swallowed into a silent no-op.
    pub fn update_status(&self, id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let affected = self.connection.execute(transition_sql(status), [id])?;
        if affected == 1 {
            return Ok(());
        }

        // Zero rows affected: the row is missing or sits in a disallowed
        // source status. Re-read to tell the two apart.
        let current = self.get(id)?;
        Err(StoreError::InvalidTransition {
            id: id.to_string(),
            from: current.status,
            to: status,
        })
    }

    /// Fetch a task row.
    ///
    /// # Errors
    /// `NotFound` when no row has the id.
    pub fn get(&self, id: &str) -> Result<TaskRecord, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM ingest_tasks WHERE task_id = ?");
        let mut statement = self.connection.prepare(sql.as_str())?;
        let mut rows = statement.query([id])?;
        match rows.next()? {
            Some(row) => read_task_row(row),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    /// Page of tasks ordered by `priority DESC, seq ASC`.
    ///
    /// The sink offers no OFFSET, so this reads `offset + limit` rows and
    /// discards the prefix; fine at operator scale, unsuitable for deep
    /// paging.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the query.
    pub fn list(
        &self,
        filter: &TaskFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let (clause, params) = filter_sql(filter);
        let fetch = offset.saturating_add(limit);
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM ingest_tasks{clause} \
             ORDER BY priority DESC, seq ASC LIMIT {fetch}"
        );
        let mut statement = self.connection.prepare(sql.as_str())?;
        let mut rows = statement.query(params.as_slice())?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(read_task_row(row)?);
        }
        Ok(records.into_iter().skip(offset).collect())
    }

    /// Highest-priority `Pending` task, insertion order breaking ties.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the query.
    pub fn next_pending(&self, kind: Option<&str>) -> Result<Option<TaskRecord>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM ingest_tasks WHERE status = 'Pending'{} \
             ORDER BY priority DESC, seq ASC LIMIT 1",
            if kind.is_some() { " AND kind = ?" } else { "" },
        );
        let mut statement = self.connection.prepare(sql.as_str())?;
        let mut rows = match kind {
            Some(kind) => statement.query([kind])?,
            None => statement.query([] as [&dyn ToSql; 0])?,
        };
        match rows.next()? {
            Some(row) => Ok(Some(read_task_row(row)?)),
            None => Ok(None),
        }
    }

    /// Atomically take a `Pending` task into `Running`.
    ///
    /// Success is exactly rows-affected == 1; there is no re-read, so two
    /// claimers racing on one row cannot both win. A concurrent write
    /// conflict from the embedded engine counts as losing the race.
    ///
    /// # Errors
    /// `Unavailable` for database failures other than an update conflict.
    pub fn claim(&self, id: &str) -> Result<bool, StoreError> {
        let result = self.connection.execute(
            "UPDATE ingest_tasks \
             SET status = 'Running', started_at = COALESCE(started_at, now()) \
             WHERE task_id = ? AND status = 'Pending'",
            [id],
        );
        match result {
            Ok(affected) => Ok(affected == 1),
            Err(error) if is_write_conflict(&error) => {
                debug!(task_id = id, "claim lost to a concurrent writer");
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Close a running task: `Succeeded` when the body reported success,
    /// `Failed` otherwise.
    ///
    /// # Errors
    /// As `update_status`.
    pub fn complete(&self, id: &str, success: bool) -> Result<(), StoreError> {
        let status = if success {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        };
        self.update_status(id, status)
    }

    /// Cancel a task that has not started; only `Pending` rows qualify.
    ///
    /// # Errors
    /// As `update_status`.
    pub fn cancel(&self, id: &str) -> Result<(), StoreError> {
        self.update_status(id, TaskStatus::Cancelled)
    }

    /// Move every task stuck in `Running` longer than `older_than` to
    /// `Retrying`, returning the recovered ids.
    ///
    /// The sweep is explicit and operator-driven; nothing runs it
    /// automatically. Recovered tasks wait in `Retrying` until `requeue`
    /// releases them.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects a statement.
    pub fn recover_stuck(&self, older_than: Duration) -> Result<Vec<String>, StoreError> {
        let cutoff_secs = i64::try_from(older_than.as_secs()).unwrap_or(i64::MAX);
        let mut statement = self.connection.prepare(
            "SELECT task_id FROM ingest_tasks \
             WHERE status = 'Running' AND started_at IS NOT NULL \
             AND started_at < now() - to_seconds(?)",
        )?;
        let mut rows = statement.query([cutoff_secs])?;
        let mut stale = Vec::new();
        while let Some(row) = rows.next()? {
            stale.push(row.get::<_, String>(0)?);
        }

        let mut recovered = Vec::new();
        for id in stale {
            // Conditional per row: a task that finished between the scan and
            // this update stays untouched.
            let affected = self.connection.execute(
                "UPDATE ingest_tasks SET status = 'Retrying' \
                 WHERE task_id = ? AND status = 'Running'",
                [id.as_str()],
            )?;
            if affected == 1 {
                info!(task_id = %id, "recovered stuck task into Retrying");
                recovered.push(id);
            }
        }
        Ok(recovered)
    }

    /// Release a `Retrying` task back to the backlog, clearing both
    /// timestamps so the next cycle records fresh ones.
    ///
    /// # Errors
    /// As `update_status`.
    pub fn requeue(&self, id: &str) -> Result<(), StoreError> {
        self.update_status(id, TaskStatus::Pending)
    }

    /// Number of tasks matching the filter.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the query.
    pub fn count(&self, filter: &TaskFilter) -> Result<usize, StoreError> {
        let (clause, params) = filter_sql(filter);
        let sql = format!("SELECT COUNT(*) FROM ingest_tasks{clause}");
        let count: u64 = self
            .connection
            .query_row(sql.as_str(), params.as_slice(), |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// The conditional update implementing one transition of the state machine.
const fn transition_sql(to: TaskStatus) -> &'static str {
    match to {
        TaskStatus::Pending => {
            "UPDATE ingest_tasks SET status = 'Pending', started_at = NULL, ended_at = NULL \
             WHERE task_id = ? AND status = 'Retrying'"
        }
        TaskStatus::Running => {
            "UPDATE ingest_tasks SET status = 'Running', \
             started_at = COALESCE(started_at, now()) \
             WHERE task_id = ? AND status IN ('Pending', 'Running')"
        }
        TaskStatus::Succeeded => {
            "UPDATE ingest_tasks SET status = 'Succeeded', \
             ended_at = COALESCE(ended_at, now()) \
             WHERE task_id = ? AND status = 'Running'"
        }
        TaskStatus::Failed => {
            "UPDATE ingest_tasks SET status = 'Failed', \
             ended_at = COALESCE(ended_at, now()) \
             WHERE task_id = ? AND status = 'Running'"
        }
        TaskStatus::Cancelled => {
            "UPDATE ingest_tasks SET status = 'Cancelled', \
             ended_at = COALESCE(ended_at, now()) \
             WHERE task_id = ? AND status = 'Pending'"
        }
        TaskStatus::Retrying => {
            "UPDATE ingest_tasks SET status = 'Retrying' WHERE task_id = ?"
        }
    }
}

fn filter_sql<'a>(filter: &'a TaskFilter) -> (String, Vec<&'a dyn ToSql>) {
    let mut clauses: Vec<&'static str> = Vec::new();
    let mut params: Vec<&'a dyn ToSql> = Vec::new();
    if let Some(status) = filter.status.as_ref() {
        clauses.push("status = ?");
        params.push(status);
    }
    if let Some(kind) = filter.kind.as_ref() {
        clauses.push("kind = ?");
        params.push(kind);
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (clause, params)
}

fn read_task_row(row: &duckdb::Row<'_>) -> Result<TaskRecord, StoreError> {
    let status_text: String = row.get(5)?;
    let status = TaskStatus::parse(status_text.as_str())
        .ok_or_else(|| StoreError::CorruptRow(format!("unknown task status '{status_text}'")))?;
    Ok(TaskRecord {
        task_id: row.get(0)?,
        kind: row.get(1)?,
        description: row.get(2)?,
        params: row.get(3)?,
        priority: row.get(4)?,
        status,
        seq: row.get(6)?,
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        ended_at: row.get(9)?,
    })
}

/// Concurrent claimers updating one row surface as an optimistic-concurrency
/// conflict in the embedded engine.
fn is_write_conflict(error: &duckdb::Error) -> bool {
    let message = error.to_string();
    message.contains("Conflict on update") || message.contains("write-write conflict")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Warehouse, WarehouseConfig};
    use tempfile::tempdir;

    fn new_task(id: &str, kind: &str, priority: i64) -> NewTask {
        NewTask {
            task_id: id.to_string(),
            kind: kind.to_string(),
            description: format!("test task {id}"),
            params: String::from("{}"),
            priority,
        }
    }

    fn open_store(dir: &std::path::Path) -> (Warehouse, TaskStore) {
        let warehouse =
            Warehouse::open(WarehouseConfig::at(dir.join("vault"))).expect("warehouse open");
        let store = warehouse.task_store().expect("task store");
        (warehouse, store)
    }

    #[test]
    fn status_labels_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("  running "), Some(TaskStatus::Running));
        assert_eq!(TaskStatus::parse("unknown"), None);
    }

    #[test]
    fn insert_then_get_returns_the_same_task() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        store
            .insert(NewTask {
                task_id: String::from("task-a"),
                kind: String::from("daily_bars"),
                description: String::from("Download daily data for 600000"),
                params: String::from(r#"{"code":"600000"}"#),
                priority: 7,
            })
            .expect("insert");

        let record = store.get("task-a").expect("get");
        assert_eq!(record.kind, "daily_bars");
        assert_eq!(record.params, r#"{"code":"600000"}"#);
        assert_eq!(record.priority, 7);
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(record.created_at.is_some());
        assert!(record.started_at.is_none());
        assert!(record.ended_at.is_none());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        store.insert(new_task("dup", "daily_bars", 0)).expect("first insert");
        let error = store
            .insert(new_task("dup", "daily_bars", 0))
            .expect_err("second insert should fail");
        assert!(matches!(error, StoreError::DuplicateId { id } if id == "dup"));
    }

    #[test]
    fn terminal_states_only_follow_running() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        store.insert(new_task("t", "daily_bars", 0)).expect("insert");
        let error = store
            .update_status("t", TaskStatus::Succeeded)
            .expect_err("Pending -> Succeeded must be rejected");
        assert!(matches!(
            error,
            StoreError::InvalidTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Succeeded,
                ..
            }
        ));

        store.update_status("t", TaskStatus::Running).expect("to Running");
        store.complete("t", true).expect("to Succeeded");
        assert_eq!(store.get("t").expect("get").status, TaskStatus::Succeeded);
    }

    #[test]
    fn missing_task_reports_not_found() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        let error = store
            .update_status("ghost", TaskStatus::Running)
            .expect_err("missing row");
        assert!(matches!(error, StoreError::NotFound { id } if id == "ghost"));
    }

    #[test]
    fn cancel_requires_pending() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        store.insert(new_task("c", "daily_bars", 0)).expect("insert");
        store.cancel("c").expect("cancel pending task");
        assert_eq!(store.get("c").expect("get").status, TaskStatus::Cancelled);

        store.insert(new_task("r", "daily_bars", 0)).expect("insert");
        store.update_status("r", TaskStatus::Running).expect("to Running");
        let error = store.cancel("r").expect_err("running tasks cannot be cancelled");
        assert!(matches!(error, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn requeue_clears_timestamps_for_a_fresh_cycle() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        store.insert(new_task("rq", "daily_bars", 0)).expect("insert");
        store.update_status("rq", TaskStatus::Running).expect("to Running");
        store.complete("rq", false).expect("to Failed");
        store.update_status("rq", TaskStatus::Retrying).expect("to Retrying");

        store.requeue("rq").expect("requeue");
        let record = store.get("rq").expect("get");
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(record.started_at.is_none());
        assert!(record.ended_at.is_none());
    }

    #[test]
    fn list_orders_by_priority_then_insertion() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        for (index, priority) in [3_i64, 1, 3, 2].into_iter().enumerate() {
            store
                .insert(new_task(&format!("t{index}"), "daily_bars", priority))
                .expect("insert");
        }

        let listed = store
            .list(&TaskFilter::default(), 10, 0)
            .expect("list all");
        let ids: Vec<&str> = listed.iter().map(|task| task.task_id.as_str()).collect();
        assert_eq!(ids, ["t0", "t2", "t3", "t1"]);

        // No OFFSET in the sink: the store over-fetches and slices.
        let page = store.list(&TaskFilter::default(), 2, 1).expect("page");
        let page_ids: Vec<&str> = page.iter().map(|task| task.task_id.as_str()).collect();
        assert_eq!(page_ids, ["t2", "t3"]);
    }

    #[test]
    fn claim_takes_a_pending_task_exactly_once() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        store.insert(new_task("cl", "daily_bars", 0)).expect("insert");
        assert!(store.claim("cl").expect("first claim"));
        assert!(!store.claim("cl").expect("second claim must lose"));
        assert_eq!(store.get("cl").expect("get").status, TaskStatus::Running);
    }

    #[test]
    fn recover_stuck_only_touches_old_running_rows() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        store.insert(new_task("old", "daily_bars", 0)).expect("insert");
        store.insert(new_task("fresh", "daily_bars", 0)).expect("insert");
        assert!(store.claim("old").expect("claim old"));
        assert!(store.claim("fresh").expect("claim fresh"));

        // Nothing is older than an hour yet.
        let recovered = store
            .recover_stuck(Duration::from_secs(3600))
            .expect("sweep with wide cutoff");
        assert!(recovered.is_empty());

        // With a zero cutoff both running rows are stale.
        let recovered = store
            .recover_stuck(Duration::from_secs(0))
            .expect("sweep with zero cutoff");
        assert_eq!(recovered.len(), 2);
        assert_eq!(store.get("old").expect("get").status, TaskStatus::Retrying);

        let counted = store
            .count(&TaskFilter::with_status(TaskStatus::Retrying))
            .expect("count retrying");
        assert_eq!(counted, 2);
    }

    #[test]
    fn filters_constrain_list_and_count() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, store) = open_store(temp.path());

        store.insert(new_task("a", "daily_bars", 0)).expect("insert");
        store.insert(new_task("b", "inst_flow", 0)).expect("insert");
        store.claim("b").expect("claim b");

        let filter = TaskFilter {
            status: Some(TaskStatus::Pending),
            kind: Some(String::from("daily_bars")),
        };
        assert_eq!(store.count(&filter).expect("count"), 1);
        let listed = store.list(&filter, 10, 0).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].task_id, "a");

        assert_eq!(
            store
                .next_pending(Some("daily_bars"))
                .expect("next pending")
                .expect("one pending daily_bars task")
                .task_id,
            "a"
        );
        assert!(store
            .next_pending(Some("inst_flow"))
            .expect("next pending")
            .is_none());
    }
}
