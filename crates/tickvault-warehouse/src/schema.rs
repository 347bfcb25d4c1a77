//! Versioned schema migrations and column backfills.
//!
//! Migrations run once per database file, tracked in `schema_migrations`.
//! The column backfill runs on every open: columns added after the first
//! schema shipped are restored to older files through `ALTER TABLE`, driven
//! off `information_schema.columns`, instead of a destructive rebuild.

use duckdb::Connection;
use tracing::info;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_task_queue",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS ingest_task_seq START 1;

CREATE TABLE IF NOT EXISTS ingest_tasks (
    task_id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    params TEXT NOT NULL DEFAULT '{}',
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'Pending',
    seq BIGINT NOT NULL DEFAULT nextval('ingest_task_seq'),
    created_at TIMESTAMP NOT NULL DEFAULT now(),
    started_at TIMESTAMP,
    ended_at TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_market_data",
        sql: r#"
CREATE TABLE IF NOT EXISTS securities (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    company_name TEXT NOT NULL DEFAULT '',
    market TEXT NOT NULL,
    listing_date DATE
);

CREATE TABLE IF NOT EXISTS daily_bars (
    code TEXT NOT NULL,
    trade_date DATE NOT NULL,
    adjust TEXT NOT NULL DEFAULT '',
    open DOUBLE,
    close DOUBLE,
    high DOUBLE,
    low DOUBLE,
    volume BIGINT,
    amount DOUBLE,
    turnover DOUBLE,
    outstanding_share DOUBLE
);
"#,
    },
    Migration {
        version: "0003_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_ingest_tasks_status_priority ON ingest_tasks(status, priority);
CREATE INDEX IF NOT EXISTS idx_ingest_tasks_kind ON ingest_tasks(kind);
CREATE INDEX IF NOT EXISTS idx_daily_bars_code_date ON daily_bars(code, trade_date);
"#,
    },
];

struct ColumnBackfill {
    table: &'static str,
    column: &'static str,
    definition: &'static str,
}

/// Lifecycle timestamps postdate the first task table; database files written
/// before them gain the columns here.
const COLUMN_BACKFILLS: &[ColumnBackfill] = &[
    ColumnBackfill {
        table: "ingest_tasks",
        column: "created_at",
        definition: "TIMESTAMP",
    },
    ColumnBackfill {
        table: "ingest_tasks",
        column: "started_at",
        definition: "TIMESTAMP",
    },
    ColumnBackfill {
        table: "ingest_tasks",
        column: "ended_at",
        definition: "TIMESTAMP",
    },
];

/// Apply pending migrations, then backfill missing columns.
///
/// # Errors
/// Returns an error when the embedded database rejects migration SQL.
pub fn apply_migrations(connection: &Connection) -> Result<(), duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT now()
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;
        if applied == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
            info!(version = migration.version, "applied schema migration");
        }
    }

    for backfill in COLUMN_BACKFILLS {
        if ensure_column(connection, backfill)? {
            info!(
                table = backfill.table,
                column = backfill.column,
                "backfilled missing column"
            );
        }
    }

    Ok(())
}

/// Add the column when `information_schema` does not list it yet; returns
/// whether anything changed.
fn ensure_column(connection: &Connection, backfill: &ColumnBackfill) -> Result<bool, duckdb::Error> {
    let present: i64 = connection.query_row(
        "SELECT COUNT(*) FROM information_schema.columns WHERE table_name = ? AND column_name = ?",
        [backfill.table, backfill.column],
        |row| row.get(0),
    )?;
    if present > 0 {
        return Ok(false);
    }

    // Identifiers come from the static backfill table above, never from input.
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        backfill.table, backfill.column, backfill.definition
    );
    connection.execute_batch(sql.as_str())?;
    Ok(true)
}
