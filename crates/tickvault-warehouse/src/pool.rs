//! `DuckDB` connection pool management.
//!
//! `DuckDB` permits one embedded instance per database file, so the pool opens
//! a single root connection up front and hands out clones of it via
//! [`duckdb::Connection::try_clone`]. Opening a second instance on the same
//! file would fail on the file lock; cloned connections share the root
//! instance and see each other's committed writes, with concurrent updates to
//! the same row resolving through the engine's optimistic conflict checks.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use duckdb::Connection;

struct PoolState {
    root: Connection,
    idle: Vec<Connection>,
}

struct PoolInner {
    db_path: PathBuf,
    max_idle: usize,
    state: Mutex<PoolState>,
}

/// A connection pool over one embedded `DuckDB` instance.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open the database file and build the pool around its root connection.
    ///
    /// # Arguments
    /// * `path` - Path to the `DuckDB` database file
    /// * `max_idle` - Maximum number of idle connections kept for reuse
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, duckdb::Error> {
        let db_path = path.into();
        let root = Connection::open(db_path.as_path())?;
        configure_connection(&root)?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                max_idle: max_idle.max(1),
                state: Mutex::new(PoolState {
                    root,
                    idle: Vec::new(),
                }),
            }),
        })
    }

    /// Acquire a connection, reusing an idle one when available and cloning
    /// the root connection otherwise.
    ///
    /// # Errors
    /// Returns an error if cloning the root connection fails.
    ///
    /// # Panics
    /// Panics if the connection pool mutex is poisoned (indicating a previous
    /// panic while holding the lock).
    pub fn acquire(&self) -> Result<PooledConnection, duckdb::Error> {
        let mut state = self
            .inner
            .state
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        let connection = match state.idle.pop() {
            Some(connection) => connection,
            None => {
                let connection = state.root.try_clone()?;
                configure_connection(&connection)?;
                connection
            }
        };
        drop(state);

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut state = self
            .pool
            .state
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        if state.idle.len() < self.pool.max_idle {
            state.idle.push(connection);
        }
    }
}

/// Configure a connection with the session settings every handle needs.
///
/// # Errors
/// Returns an error if configuration SQL fails to execute.
fn configure_connection(connection: &Connection) -> Result<(), duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pooled_connections_share_the_root_instance() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::open(temp.path().join("pool.duckdb"), 2).expect("pool open");

        let writer = pool.acquire().expect("writer connection");
        writer
            .execute_batch("CREATE TABLE marks (id INTEGER); INSERT INTO marks VALUES (7);")
            .expect("write through first connection");

        let reader = pool.acquire().expect("reader connection");
        let seen: i64 = reader
            .query_row("SELECT id FROM marks", [], |row| row.get(0))
            .expect("read through second connection");
        assert_eq!(seen, 7);
    }

    #[test]
    fn dropped_connections_are_reused_up_to_the_idle_cap() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::open(temp.path().join("pool.duckdb"), 1).expect("pool open");

        let first = pool.acquire().expect("first connection");
        let second = pool.acquire().expect("second connection");
        drop(first);
        drop(second);

        // Only one idle slot, so a fresh acquire reuses the kept connection
        // and the pool stays usable afterwards.
        let reused = pool.acquire().expect("reused connection");
        reused
            .execute_batch("CREATE TABLE reuse_probe (id INTEGER)")
            .expect("statement on reused connection");
    }
}
