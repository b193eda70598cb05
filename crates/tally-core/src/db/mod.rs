//! SQLite database utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers keep working while a writer holds the lock
//! - `busy_timeout = 5s` so concurrent allocators queue instead of failing
//! - `foreign_keys = ON` so counters and issues always point at a real team

pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::{path::Path, time::Duration};

/// Busy timeout used for tally connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database file name inside the `.tally/` directory.
pub const DB_FILE_NAME: &str = "tally.db";

/// Open (or create) the tally database, apply runtime pragmas, and migrate
/// schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_db(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open database {}", path.display()))?;

    configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply schema migrations")?;

    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

/// Open an in-memory database with the full schema. Used by tests and
/// dry runs.
///
/// # Errors
///
/// Returns an error if migrating the schema fails.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    migrations::migrate(&mut conn).context("apply schema migrations")?;
    Ok(conn)
}

/// Start a `BEGIN IMMEDIATE` transaction. The write lock is taken up front,
/// so contention waits on the busy timeout rather than failing on upgrade.
///
/// # Errors
///
/// Returns an error if the lock cannot be acquired within the busy timeout.
pub fn write_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_db, open_in_memory};
    use crate::db::migrations;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(".tally").join("tally.db");
        (dir, path)
    }

    #[test]
    fn open_db_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let conn = open_db(&path, DEFAULT_BUSY_TIMEOUT).expect("open db");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn open_db_runs_migrations() {
        let (_dir, path) = temp_db_path();
        let conn = open_db(&path, DEFAULT_BUSY_TIMEOUT).expect("open db");

        let version = migrations::current_schema_version(&conn).expect("schema version query");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn reopening_keeps_schema_version() {
        let (_dir, path) = temp_db_path();
        drop(open_db(&path, DEFAULT_BUSY_TIMEOUT).expect("first open"));
        let conn = open_db(&path, DEFAULT_BUSY_TIMEOUT).expect("second open");

        let version = migrations::current_schema_version(&conn).expect("schema version query");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn in_memory_db_enforces_foreign_keys() {
        let conn = open_in_memory().expect("open in-memory");
        let result = conn.execute(
            "INSERT INTO teams VALUES ('tm-1', 'ws-missing', 'ENG', 'Eng', 1, 1)",
            [],
        );
        assert!(result.is_err());
    }
}
