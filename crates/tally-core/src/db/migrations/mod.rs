//! SQLite schema migrations for the tally database.

use super::schema;
use rusqlite::{Connection, TransactionBehavior, types::Type};

/// Schema version written by this build.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[
    (1, schema::MIGRATION_V1_SQL),
    (2, schema::MIGRATION_V2_SQL),
];

/// Schema version recorded in `PRAGMA user_version`.
///
/// # Errors
///
/// Returns an error if the pragma query fails or the stored value is
/// negative or too large.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Bring the schema up to [`LATEST_SCHEMA_VERSION`].
///
/// Each migration runs in an immediate transaction and re-reads
/// `user_version` once the write lock is held, so two processes opening the
/// same fresh database apply every migration exactly once.
///
/// # Errors
///
/// Returns the first SQLite error hit; that migration is rolled back.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        current = current_schema_version(&tx)?;
        if *version <= current {
            tx.commit()?;
            continue;
        }

        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.execute(
            "UPDATE tally_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(*version)],
        )?;
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use crate::db::schema;
    use rusqlite::{Connection, params};

    fn schema_has(
        conn: &Connection,
        object_type: &str,
        object_name: &str,
    ) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            )",
            params![object_type, object_name],
            |row| row.get(0),
        )
    }

    #[test]
    fn fresh_database_gets_every_table_and_index() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        let applied = migrate(&mut conn)?;
        assert_eq!(applied, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);

        for table in [
            "workspaces",
            "teams",
            "sequence_counters",
            "issues",
            "issue_events",
            "tally_meta",
            "labels",
            "issue_labels",
            "issue_comments",
        ] {
            assert!(schema_has(&conn, "table", table)?, "missing table {table}");
        }

        for index in schema::REQUIRED_INDEXES {
            assert!(
                schema_has(&conn, "index", index)?,
                "index {index} was not created"
            );
        }

        Ok(())
    }

    #[test]
    fn second_migrate_changes_nothing() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);

        let meta_rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM tally_meta", [], |row| row.get(0))?;
        assert_eq!(meta_rows, 1);

        let schema_version: i64 = conn.query_row(
            "SELECT schema_version FROM tally_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(schema_version, i64::from(LATEST_SCHEMA_VERSION));

        Ok(())
    }

    #[test]
    fn version_one_database_is_upgraded_in_place() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::MIGRATION_V1_SQL)?;
        conn.pragma_update(None, "user_version", 1)?;
        conn.execute_batch(
            "UPDATE tally_meta SET schema_version = 1 WHERE id = 1;
             INSERT INTO workspaces VALUES ('ws-1', 'acme', 'Acme', 1);",
        )?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert!(schema_has(&conn, "table", "issue_comments")?);
        let slug: String =
            conn.query_row("SELECT slug FROM workspaces WHERE workspace_id = 'ws-1'", [], |row| {
                row.get(0)
            })?;
        assert_eq!(slug, "acme");
        Ok(())
    }

    #[test]
    fn label_names_are_unique_per_workspace_ignoring_case() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        conn.execute_batch(
            "INSERT INTO workspaces VALUES ('ws-1', 'acme', 'Acme', 1);
             INSERT INTO workspaces VALUES ('ws-2', 'zeta', 'Zeta', 1);
             INSERT INTO labels VALUES ('lb-1', 'ws-1', 'Bug', 'red', 1);
             INSERT INTO labels VALUES ('lb-2', 'ws-2', 'bug', 'red', 1);",
        )?;

        let result = conn.execute(
            "INSERT INTO labels VALUES ('lb-3', 'ws-1', 'BUG', 'red', 1)",
            [],
        );
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn counter_values_cannot_go_negative() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        conn.execute_batch(
            "INSERT INTO workspaces VALUES ('ws-1', 'acme', 'Acme', 1);
             INSERT INTO teams VALUES ('tm-1', 'ws-1', 'ENG', 'Engineering', 1, 1);",
        )?;

        let result = conn.execute(
            "INSERT INTO sequence_counters (workspace_id, team_id, current_value)
             VALUES ('ws-1', 'tm-1', -1)",
            [],
        );
        assert!(result.is_err());
        Ok(())
    }
}
