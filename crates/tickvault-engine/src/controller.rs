//! Worker controllers.
//!
//! A [`WorkerController`] owns one background drain loop over the task
//! backlog. Commands (`start`, `pause`, `resume`, `stop`) are fire-and-forget
//! flag flips; progress is read as a [`ControllerStatus`] snapshot. Only the
//! worker mutates the counters, everything else just reads them.
//!
//! Stopping is cooperative: the stop flag is observed at the top of each
//! iteration and inside the pause wait, so an in-flight task always finishes
//! and its terminal status lands before the run ends.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use tickvault_core::MarketFeed;
use tickvault_warehouse::{TaskFilter, TaskRecord, TaskStatus, Warehouse};

use crate::error::EngineError;
use crate::executor::Executor;
use crate::jobs;
use crate::seed;

/// How often a paused worker re-checks the pause and stop flags.
const PAUSE_POLL: Duration = Duration::from_millis(200);

/// Fixed breather between tasks; bounds the drain rate.
const TASK_GAP: Duration = Duration::from_millis(10);

/// What a run does before draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    /// Populate securities when empty, reseed the daily-bar backlog, then
    /// drain `daily_bars` tasks.
    FullRefresh,
    /// Drain whatever is pending, any kind.
    DrainOnly,
}

/// Point-in-time view of a controller run.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub running: bool,
    pub paused: bool,
    pub total: u64,
    pub done: u64,
    pub failed: u64,
    /// Label of the task being executed right now.
    pub current: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    /// Whether the last run ended on an operator stop rather than by
    /// draining the backlog.
    pub stopped_by_request: bool,
}

struct ControllerShared {
    running: AtomicBool,
    paused: AtomicBool,
    stop: AtomicBool,
    stopped_by_request: AtomicBool,
    total: AtomicU64,
    done: AtomicU64,
    failed: AtomicU64,
    current: Mutex<Option<String>>,
    started_at: Mutex<Option<String>>,
    ended_at: Mutex<Option<String>>,
}

impl ControllerShared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            stopped_by_request: AtomicBool::new(false),
            total: AtomicU64::new(0),
            done: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            current: Mutex::new(None),
            started_at: Mutex::new(None),
            ended_at: Mutex::new(None),
        }
    }

    /// Clears everything but `running`, which the caller has already taken.
    fn reset_for_run(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.stop.store(false, Ordering::SeqCst);
        self.stopped_by_request.store(false, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        *self.lock_field(&self.current) = None;
        *self.lock_field(&self.started_at) = Some(now_stamp());
        *self.lock_field(&self.ended_at) = None;
    }

    fn finish(&self) {
        *self.lock_field(&self.current) = None;
        *self.lock_field(&self.ended_at) = Some(now_stamp());
        self.running.store(false, Ordering::SeqCst);
    }

    fn snapshot(&self) -> ControllerStatus {
        ControllerStatus {
            running: self.running.load(Ordering::SeqCst),
            paused: self.paused.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
            done: self.done.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            current: self.lock_field(&self.current).clone(),
            started_at: self.lock_field(&self.started_at).clone(),
            ended_at: self.lock_field(&self.ended_at).clone(),
            stopped_by_request: self.stopped_by_request.load(Ordering::SeqCst),
        }
    }

    fn lock_field<'a>(
        &self,
        field: &'a Mutex<Option<String>>,
    ) -> std::sync::MutexGuard<'a, Option<String>> {
        field.lock().expect("controller state mutex poisoned")
    }
}

/// One background drain loop over the task backlog, with cooperative pause
/// and stop.
///
/// The composition root holds at most one controller per mode; each run
/// acquires its own task store and sink session from the warehouse pool.
pub struct WorkerController {
    warehouse: Warehouse,
    feed: Arc<dyn MarketFeed>,
    mode: ControllerMode,
    shared: Arc<ControllerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerController {
    pub fn new(warehouse: Warehouse, feed: Arc<dyn MarketFeed>, mode: ControllerMode) -> Self {
        Self {
            warehouse,
            feed,
            mode,
            shared: Arc::new(ControllerShared::new()),
            handle: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    /// Spawns the worker. Returns `false` when a run is already live.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shared.reset_for_run();

        let warehouse = self.warehouse.clone();
        let feed = Arc::clone(&self.feed);
        let mode = self.mode;
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            info!(?mode, "worker starting");
            if let Err(error) = run_worker(&warehouse, feed.as_ref(), mode, &shared).await {
                error!(?mode, %error, "worker run aborted");
            }
            shared.finish();
            info!(?mode, "worker finished");
        });
        *self
            .handle
            .lock()
            .expect("controller handle mutex poisoned") = Some(handle);
        true
    }

    /// Freezes the worker before its next claim; idempotent, no effect when
    /// nothing is running.
    pub fn pause(&self) {
        if self.shared.running.load(Ordering::SeqCst) {
            self.shared.paused.store(true, Ordering::SeqCst);
            info!("worker paused");
        }
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    /// Requests a stop. The worker observes the flag at the next iteration
    /// or pause poll; the in-flight task finishes first.
    pub fn stop(&self) {
        if self.shared.running.load(Ordering::SeqCst) {
            self.shared.stopped_by_request.store(true, Ordering::SeqCst);
            info!("worker stop requested");
        }
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        self.shared.snapshot()
    }

    /// Waits for the current run's worker to end, if one was started.
    pub async fn join(&self) {
        let handle = self
            .handle
            .lock()
            .expect("controller handle mutex poisoned")
            .take();
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                error!(%error, "worker task join failed");
            }
            return;
        }
        // Another waiter holds the handle; fall back to watching the flag.
        while self.shared.running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

async fn run_worker(
    warehouse: &Warehouse,
    feed: &dyn MarketFeed,
    mode: ControllerMode,
    shared: &ControllerShared,
) -> Result<(), EngineError> {
    let store = warehouse.task_store()?;
    let session = warehouse.session()?;
    let executor = Executor::new(&store, feed, &session);

    let kind = match mode {
        ControllerMode::FullRefresh => {
            seed::populate_securities(feed, &session).await?;
            seed::seed_backlog(&executor, &session)?;
            Some(jobs::DAILY_BARS)
        }
        ControllerMode::DrainOnly => None,
    };

    let total = store.count(&TaskFilter {
        status: Some(TaskStatus::Pending),
        kind: kind.map(str::to_string),
    })?;
    shared.total.store(total as u64, Ordering::SeqCst);
    info!(total, "worker draining");

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }
        if shared.paused.load(Ordering::SeqCst) {
            tokio::time::sleep(PAUSE_POLL).await;
            continue;
        }

        let Some(task) = store.next_pending(kind)? else {
            break;
        };
        if !store.claim(&task.task_id)? {
            debug!(task_id = %task.task_id, "lost the claim race, backing off");
            tokio::time::sleep(claim_backoff()).await;
            continue;
        }

        *shared.lock_field(&shared.current) = Some(current_label(&task));
        let success = executor.execute(&task).await;
        if success {
            shared.done.fetch_add(1, Ordering::SeqCst);
        } else {
            shared.failed.fetch_add(1, Ordering::SeqCst);
        }
        *shared.lock_field(&shared.current) = None;

        tokio::time::sleep(TASK_GAP).await;
    }
    Ok(())
}

fn current_label(task: &TaskRecord) -> String {
    if task.description.is_empty() {
        task.task_id.clone()
    } else {
        task.description.clone()
    }
}

// Losing a claim means another worker is on the same row; a short random
// wait keeps the two from re-colliding on the next one.
fn claim_backoff() -> Duration {
    Duration::from_millis(25 + fastrand::u64(0..50))
}

fn now_stamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339).unwrap_or_else(|_| now.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tickvault_core::{Market, ScriptedFeed};
    use tickvault_warehouse::{NewTask, WarehouseConfig};

    fn open_warehouse(dir: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig::at(dir.path())).expect("warehouse should open")
    }

    fn queue_bars_task(warehouse: &Warehouse, id: &str) {
        let store = warehouse.task_store().expect("store should open");
        store
            .insert(NewTask {
                task_id: id.to_string(),
                kind: jobs::DAILY_BARS.to_string(),
                description: format!("Download daily data for {id}"),
                params: "{\"code\":\"600000\",\"adjust\":\"\"}".to_string(),
                priority: 0,
            })
            .expect("task should insert");
    }

    #[tokio::test]
    async fn drain_only_processes_every_pending_task() {
        let dir = tempdir().expect("tempdir should be creatable");
        let warehouse = open_warehouse(&dir);
        for i in 0..3 {
            queue_bars_task(&warehouse, &format!("drain-{i}"));
        }
        let feed = Arc::new(ScriptedFeed::new());
        feed.set_default_daily(ScriptedFeed::bar_table(&["2024-01-05"]));

        let controller =
            WorkerController::new(warehouse.clone(), feed, ControllerMode::DrainOnly);
        assert!(controller.start());
        controller.join().await;

        let status = controller.status();
        assert!(!status.running);
        assert!(!status.stopped_by_request);
        assert_eq!(status.total, 3);
        assert_eq!(status.done, 3);
        assert_eq!(status.failed, 0);
        assert!(status.started_at.is_some());
        assert!(status.ended_at.is_some());

        let store = warehouse.task_store().expect("store should open");
        let succeeded = store
            .count(&TaskFilter::with_status(TaskStatus::Succeeded))
            .expect("count should read");
        assert_eq!(succeeded, 3);
    }

    #[tokio::test]
    async fn a_second_start_is_rejected_while_the_run_is_live() {
        let dir = tempdir().expect("tempdir should be creatable");
        let warehouse = open_warehouse(&dir);
        let feed = Arc::new(ScriptedFeed::new());

        let controller = WorkerController::new(warehouse, feed, ControllerMode::DrainOnly);
        assert!(controller.start());
        // The worker has not yielded yet on the current-thread runtime, so
        // the first run is still live.
        assert!(!controller.start());
        controller.join().await;

        assert!(!controller.status().running);
        assert!(controller.start());
        controller.join().await;
    }

    #[tokio::test]
    async fn full_refresh_populates_seeds_and_drains() {
        let dir = tempdir().expect("tempdir should be creatable");
        let warehouse = open_warehouse(&dir);
        let feed = Arc::new(ScriptedFeed::new());
        feed.set_listing(
            Market::Sh,
            ScriptedFeed::listing_table(&[
                ("600000", "浦发银行", "1999-11-10"),
                ("600519", "贵州茅台", "2001-08-27"),
            ]),
        );
        feed.set_default_daily(ScriptedFeed::bar_table(&["2024-01-05"]));

        let controller =
            WorkerController::new(warehouse.clone(), feed, ControllerMode::FullRefresh);
        assert!(controller.start());
        controller.join().await;

        let status = controller.status();
        assert_eq!(status.total, 2);
        assert_eq!(status.done, 2);

        let session = warehouse.session().expect("session should open");
        assert_eq!(session.securities_count().expect("count should read"), 2);
        // Two securities, three adjustment passes, one bar each.
        assert_eq!(session.daily_bar_count().expect("count should read"), 6);
    }
}
