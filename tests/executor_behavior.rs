//! Behavior-driven tests for task execution
//!
//! These tests verify WHAT a queued task accomplishes end to end: generated
//! parameters land canonically, execution always reaches a terminal status,
//! and the ingested rows are queryable afterwards.

use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;
use time::macros::date;

use tickvault_core::{Adjust, FeedError, Market, ScriptedFeed};
use tickvault_engine::{jobs, Executor, TaskDef};
use tickvault_warehouse::{TaskStatus, Warehouse, WarehouseConfig};

fn open_warehouse(temp: &tempfile::TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig::at(temp.path().join("vault"))).expect("warehouse open")
}

// =============================================================================
// Execution: Daily-bar Journey
// =============================================================================

#[tokio::test]
async fn when_a_daily_bars_task_runs_bars_land_and_the_cycle_closes() {
    // Given: A queued full-history download against a scripted provider
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let store = warehouse.task_store().expect("task store");
    let session = warehouse.session().expect("session");
    let feed = Arc::new(ScriptedFeed::new());
    feed.set_default_daily(ScriptedFeed::bar_table(&["2024-01-05", "2024-01-08"]));
    let executor = Executor::new(&store, feed.as_ref(), &session);

    let task_id = executor
        .generate(&TaskDef {
            kind: jobs::DAILY_BARS.to_string(),
            description: String::from("Download daily data for 600000"),
            params: json!({
                "code": "600000",
                "market": "SH",
                "start_date": "19991110",
                "adjust": "all",
            }),
            priority: 0,
        })
        .expect("generate");

    // When: A worker claims and executes it
    assert!(store.claim(&task_id).expect("claim"));
    let task = store.get(&task_id).expect("get");
    assert!(executor.execute(&task).await, "download should succeed");

    // Then: One pass per adjustment mode was fetched for the listing window
    let requests = feed.daily_requests();
    assert_eq!(requests.len(), Adjust::PASSES.len());
    for request in &requests {
        assert_eq!(request.code, "600000");
        assert_eq!(request.market, Some(Market::Sh));
        assert_eq!(request.start, date!(1999 - 11 - 10));
    }

    // And: The bars are stored and the cycle is closed with both timestamps
    assert_eq!(
        session.daily_bar_count().expect("bar count"),
        2 * Adjust::PASSES.len()
    );
    let finished = store.get(&task_id).expect("get");
    assert_eq!(finished.status, TaskStatus::Succeeded);
    assert!(finished.started_at.is_some());
    assert!(finished.ended_at.is_some());
}

#[tokio::test]
async fn when_the_feed_fails_the_task_lands_on_failed_not_in_limbo() {
    // Given: A provider that errors on every pass
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let store = warehouse.task_store().expect("task store");
    let session = warehouse.session().expect("session");
    let feed = ScriptedFeed::new();
    for _ in Adjust::PASSES {
        feed.push_daily(Err(FeedError::unavailable("scripted outage")));
    }
    let executor = Executor::new(&store, &feed, &session);

    let task_id = executor
        .generate(&TaskDef {
            kind: jobs::DAILY_BARS.to_string(),
            description: String::from("Download daily data for 600000"),
            params: json!({ "code": "600000", "adjust": "all" }),
            priority: 0,
        })
        .expect("generate");

    // When: The task executes
    let task = store.get(&task_id).expect("get");
    let success = executor.execute(&task).await;

    // Then: Nothing was saved, the task is Failed, and the cycle is closed
    assert!(!success);
    assert_eq!(session.daily_bar_count().expect("bar count"), 0);
    let finished = store.get(&task_id).expect("get");
    assert_eq!(finished.status, TaskStatus::Failed);
    assert!(finished.ended_at.is_some(), "failures close the cycle too");
}

// =============================================================================
// Execution: Flow Journey
// =============================================================================

#[tokio::test]
async fn when_a_flow_task_runs_the_aggregate_lands_as_one_snapshot_row() {
    // Given: Billboard details on two days of a five-day window
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let store = warehouse.task_store().expect("task store");
    let session = warehouse.session().expect("session");
    let feed = ScriptedFeed::new();
    feed.set_detail(
        date!(2024 - 06 - 06),
        ScriptedFeed::flow_table(&[("600000", "PF Bank", 1200.0, 400.0)]),
    );
    feed.set_detail(
        date!(2024 - 06 - 10),
        ScriptedFeed::flow_table(&[("600000", "PF Bank", 300.0, 100.0)]),
    );
    let executor = Executor::new(&store, &feed, &session);

    // When: The aggregation task executes over that window
    let success = executor
        .execute_def(&TaskDef {
            kind: jobs::INST_FLOW.to_string(),
            description: String::from("Aggregate institutional flow for 600000"),
            params: json!({
                "codes": ["600000"],
                "query_type": 5,
                "end_date": "20240610",
            }),
            priority: 0,
        })
        .await;

    // Then: Exactly one snapshot row lands for the code
    assert!(success);
    assert_eq!(session.flow_row_count().expect("flow count"), 1);
}

// =============================================================================
// Execution: Parameter Canonicalization
// =============================================================================

#[tokio::test]
async fn when_params_arrive_as_a_bare_string_they_are_canonicalized() {
    // Given: A task blueprint whose params are a plain string
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let store = warehouse.task_store().expect("task store");
    let session = warehouse.session().expect("session");
    let feed = ScriptedFeed::new();
    let executor = Executor::new(&store, &feed, &session);

    // When: The task is generated
    let task_id = executor
        .generate(&TaskDef {
            kind: jobs::DAILY_BARS.to_string(),
            description: String::from("Download daily data for 600000"),
            params: json!("600000"),
            priority: 0,
        })
        .expect("generate");

    // Then: The stored params are a canonical JSON object
    let record = store.get(&task_id).expect("get");
    assert_eq!(record.params, "{\"value\":\"600000\"}");
}

#[tokio::test]
async fn when_params_arrive_as_an_object_their_shape_is_kept() {
    // Given: A blueprint with an already-structured object
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let store = warehouse.task_store().expect("task store");
    let session = warehouse.session().expect("session");
    let feed = ScriptedFeed::new();
    let executor = Executor::new(&store, &feed, &session);

    // When: The task is generated
    let task_id = executor
        .generate(&TaskDef {
            kind: jobs::INST_FLOW.to_string(),
            description: String::from("Aggregate institutional flow for 600000"),
            params: json!({ "codes": ["600000", "000001"] }),
            priority: 0,
        })
        .expect("generate");

    // Then: The object round-trips value-equal through storage
    let record = store.get(&task_id).expect("get");
    let stored: serde_json::Value =
        serde_json::from_str(&record.params).expect("stored params parse");
    assert_eq!(stored, json!({ "codes": ["600000", "000001"] }));
}

// =============================================================================
// Execution: Unknown Kinds
// =============================================================================

#[tokio::test]
async fn when_an_unknown_kind_executes_the_task_fails_instead_of_wedging() {
    // Given: A queued task of a kind no job implements
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let store = warehouse.task_store().expect("task store");
    let session = warehouse.session().expect("session");
    let feed = ScriptedFeed::new();
    let executor = Executor::new(&store, &feed, &session);

    // When: It executes
    let success = executor
        .execute_def(&TaskDef {
            kind: String::from("minute_bars"),
            description: String::from("Download minute data for 600000"),
            params: json!({ "code": "600000" }),
            priority: 0,
        })
        .await;

    // Then: The task reaches Failed so the queue never wedges on it
    assert!(!success);
    let tasks = store
        .list(&Default::default(), 10, 0)
        .expect("list");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Failed);
}
