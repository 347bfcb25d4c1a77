//! Ingestion writers over one pooled connection.
//!
//! A [`Session`] is the unit of sink work a controller run (or a single
//! operator command) holds on to. All writes go through parameterized
//! statements; identifiers are static. Daily bars are appended without any
//! uniqueness constraint: re-running an ingestion doubles the rows and
//! readers dedup, which keeps retries trivially safe.

use duckdb::{Connection, ToSql};

use crate::error::StoreError;
use crate::pool::PooledConnection;

/// One security basics row, dates rendered as `YYYY-MM-DD` text.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityRecord {
    pub code: String,
    pub name: String,
    pub company_name: String,
    /// Exchange label: `SH`, `SZ` or `BJ`.
    pub market: String,
    pub listing_date: Option<String>,
}

/// One daily bar ready for the sink; `None` fields land as SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarRow {
    pub code: String,
    pub trade_date: String,
    /// Adjustment pass: `""` raw, `"qfq"` forward, `"hfq"` backward.
    pub adjust: String,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<i64>,
    pub amount: Option<f64>,
    pub turnover: Option<f64>,
    pub outstanding_share: Option<f64>,
}

/// One institutional flow aggregate snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRow {
    pub ingest_date: String,
    pub code: String,
    pub name: String,
    pub buy_amount: f64,
    pub buy_count: i64,
    pub sell_amount: f64,
    pub sell_count: i64,
    pub net_amount: f64,
    pub window: i64,
}

/// How many bars go into one multi-row INSERT.
const BAR_CHUNK: usize = 256;

const BAR_COLUMN_COUNT: usize = 11;

/// Sink writers bound to one pooled connection.
pub struct Session {
    connection: PooledConnection,
}

impl Session {
    pub(crate) fn new(connection: PooledConnection) -> Self {
        Self { connection }
    }

    /// Insert security basics, ignoring codes that are already present.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the batch; the whole batch
    /// rolls back.
    pub fn insert_securities(&self, rows: &[SecurityRecord]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        self.connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, StoreError> {
            for row in rows {
                let params: [&dyn ToSql; 5] = [
                    &row.code,
                    &row.name,
                    &row.company_name,
                    &row.market,
                    &row.listing_date,
                ];
                self.connection.execute(
                    "INSERT OR IGNORE INTO securities \
                     (code, name, company_name, market, listing_date) \
                     VALUES (?, ?, ?, ?, TRY_CAST(? AS DATE))",
                    params.as_slice(),
                )?;
            }
            Ok(rows.len())
        })();

        finalize_transaction(&self.connection, result)
    }

    /// All stored securities ordered by code.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the query.
    pub fn list_securities(&self) -> Result<Vec<SecurityRecord>, StoreError> {
        let mut statement = self.connection.prepare(
            "SELECT code, name, company_name, market, CAST(listing_date AS VARCHAR) \
             FROM securities ORDER BY code",
        )?;
        let mut rows = statement.query([] as [&dyn ToSql; 0])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(SecurityRecord {
                code: row.get(0)?,
                name: row.get(1)?,
                company_name: row.get(2)?,
                market: row.get(3)?,
                listing_date: row.get(4)?,
            });
        }
        Ok(records)
    }

    /// Number of stored securities.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the query.
    pub fn securities_count(&self) -> Result<usize, StoreError> {
        let count: u64 =
            self.connection
                .query_row("SELECT COUNT(*) FROM securities", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Append daily bars in chunked multi-row statements.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects a chunk; the whole batch
    /// rolls back.
    pub fn insert_daily_bars(&self, rows: &[BarRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        self.connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, StoreError> {
            for chunk in rows.chunks(BAR_CHUNK) {
                let placeholders =
                    vec!["(?, TRY_CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?, ?)"; chunk.len()]
                        .join(", ");
                let sql = format!(
                    "INSERT INTO daily_bars \
                     (code, trade_date, adjust, open, close, high, low, volume, amount, \
                      turnover, outstanding_share) VALUES {placeholders}"
                );
                let mut params: Vec<&dyn ToSql> =
                    Vec::with_capacity(chunk.len() * BAR_COLUMN_COUNT);
                for row in chunk {
                    params.push(&row.code);
                    params.push(&row.trade_date);
                    params.push(&row.adjust);
                    params.push(&row.open);
                    params.push(&row.close);
                    params.push(&row.high);
                    params.push(&row.low);
                    params.push(&row.volume);
                    params.push(&row.amount);
                    params.push(&row.turnover);
                    params.push(&row.outstanding_share);
                }
                self.connection.execute(sql.as_str(), params.as_slice())?;
            }
            Ok(rows.len())
        })();

        finalize_transaction(&self.connection, result)
    }

    /// Number of stored daily bars.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the query.
    pub fn daily_bar_count(&self) -> Result<usize, StoreError> {
        let count: u64 =
            self.connection
                .query_row("SELECT COUNT(*) FROM daily_bars", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Create the institutional flow table when absent.
    ///
    /// The flow task owns this table and ensures it before writing, mirroring
    /// how the aggregates arrive outside the regular refresh cycle.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the statement.
    pub fn ensure_flow_table(&self) -> Result<(), StoreError> {
        self.connection.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS inst_flow (
    ingest_date DATE NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    buy_amount DOUBLE NOT NULL,
    buy_count INTEGER NOT NULL,
    sell_amount DOUBLE NOT NULL,
    sell_count INTEGER NOT NULL,
    net_amount DOUBLE NOT NULL,
    "window" INTEGER NOT NULL
);
"#,
        )?;
        Ok(())
    }

    /// Append one flow aggregate snapshot per row; never upserts.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the batch; the whole batch
    /// rolls back.
    pub fn insert_flow_rows(&self, rows: &[FlowRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        self.connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, StoreError> {
            for row in rows {
                let params: [&dyn ToSql; 9] = [
                    &row.ingest_date,
                    &row.code,
                    &row.name,
                    &row.buy_amount,
                    &row.buy_count,
                    &row.sell_amount,
                    &row.sell_count,
                    &row.net_amount,
                    &row.window,
                ];
                self.connection.execute(
                    "INSERT INTO inst_flow \
                     (ingest_date, code, name, buy_amount, buy_count, sell_amount, \
                      sell_count, net_amount, \"window\") \
                     VALUES (TRY_CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?)",
                    params.as_slice(),
                )?;
            }
            Ok(rows.len())
        })();

        finalize_transaction(&self.connection, result)
    }

    /// Number of stored flow snapshots; zero when the table does not exist
    /// yet.
    ///
    /// # Errors
    /// `Unavailable` when the database rejects the query.
    pub fn flow_row_count(&self) -> Result<usize, StoreError> {
        let table_exists: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'inst_flow'",
            [],
            |row| row.get(0),
        )?;
        if table_exists == 0 {
            return Ok(0);
        }

        let count: u64 =
            self.connection
                .query_row("SELECT COUNT(*) FROM inst_flow", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Warehouse, WarehouseConfig};
    use tempfile::tempdir;

    fn open_session(dir: &std::path::Path) -> (Warehouse, Session) {
        let warehouse =
            Warehouse::open(WarehouseConfig::at(dir.join("vault"))).expect("warehouse open");
        let session = warehouse.session().expect("session");
        (warehouse, session)
    }

    fn bar(code: &str, trade_date: &str, close: f64) -> BarRow {
        BarRow {
            code: code.to_string(),
            trade_date: trade_date.to_string(),
            adjust: String::new(),
            close: Some(close),
            ..BarRow::default()
        }
    }

    #[test]
    fn securities_dedup_on_code() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, session) = open_session(temp.path());

        let record = SecurityRecord {
            code: String::from("600000"),
            name: String::from("PF Bank"),
            company_name: String::from("PF Bank Co."),
            market: String::from("SH"),
            listing_date: Some(String::from("1999-11-10")),
        };
        session
            .insert_securities(&[record.clone(), record.clone()])
            .expect("insert with duplicate code");
        session.insert_securities(&[record]).expect("re-insert");

        assert_eq!(session.securities_count().expect("count"), 1);
        let listed = session.list_securities().expect("list");
        assert_eq!(listed[0].listing_date.as_deref(), Some("1999-11-10"));
    }

    #[test]
    fn daily_bars_accept_duplicate_appends() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, session) = open_session(temp.path());

        let rows = vec![bar("600000", "2026-08-21", 10.5), bar("600000", "2026-08-22", 10.7)];
        assert_eq!(session.insert_daily_bars(&rows).expect("first run"), 2);
        assert_eq!(session.insert_daily_bars(&rows).expect("re-run"), 2);

        // Re-running the same ingestion doubles the rows; readers dedup.
        assert_eq!(session.daily_bar_count().expect("count"), 4);
    }

    #[test]
    fn bar_chunking_survives_large_batches() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, session) = open_session(temp.path());

        let rows: Vec<BarRow> = (0..(BAR_CHUNK + 3))
            .map(|day| bar("000001", &format!("2025-01-{:02}", (day % 28) + 1), day as f64))
            .collect();
        assert_eq!(
            session.insert_daily_bars(&rows).expect("chunked insert"),
            BAR_CHUNK + 3
        );
        assert_eq!(session.daily_bar_count().expect("count"), BAR_CHUNK + 3);
    }

    #[test]
    fn flow_table_is_ensured_and_appended() {
        let temp = tempdir().expect("tempdir");
        let (_warehouse, session) = open_session(temp.path());

        assert_eq!(session.flow_row_count().expect("count before ensure"), 0);
        session.ensure_flow_table().expect("ensure");
        session.ensure_flow_table().expect("ensure is idempotent");

        let row = FlowRow {
            ingest_date: String::from("2026-08-25"),
            code: String::from("600519"),
            name: String::from("KwaiJiu"),
            buy_amount: 1_250_000.0,
            buy_count: 3,
            sell_amount: 400_000.0,
            sell_count: 1,
            net_amount: 850_000.0,
            window: 5,
        };
        session.insert_flow_rows(&[row.clone()]).expect("insert");
        session.insert_flow_rows(&[row]).expect("append again");
        assert_eq!(session.flow_row_count().expect("count"), 2);
    }
}
