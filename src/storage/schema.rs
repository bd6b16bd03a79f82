//! Base schema definitions.
//!
//! `SCHEMA_SQL` is the oldest shape of the database that tally still opens.
//! Every column added since then lives in a [`MigrationStep`] rather than
//! here, so a fresh database and an upgraded one converge through the same
//! code path.
//!
//! [`MigrationStep`]: super::migrations::MigrationStep

use rusqlite::Connection;

use super::migrations::{MigrationRegistry, MigrationRunner};
use crate::error::Result;

/// The base SQL schema for the tally database.
///
/// Note: `created_at` / `updated_at` are INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Migration Ledger
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Core Tables
-- ====================

CREATE TABLE IF NOT EXISTS issues (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'open',
    priority INTEGER NOT NULL DEFAULT 2,
    issue_type TEXT NOT NULL DEFAULT 'task',
    assignee TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    closed_at INTEGER,
    CHECK (priority >= 0 AND priority <= 4)
);

CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
CREATE INDEX IF NOT EXISTS idx_issues_priority ON issues(priority);

-- Key/value store for sync bookkeeping (last_import_time, jsonl_content_hash)
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Objects `SCHEMA_SQL` creates, checked before running it.
const BASE_OBJECTS: &[&str] = &[
    "schema_migrations",
    "issues",
    "idx_issues_status",
    "idx_issues_priority",
    "metadata",
];

/// Apply the base schema, then bring it current with the built-in registry.
///
/// Idempotent. On a database that is already current only reads are
/// issued, so another connection holding a write transaction does not
/// block the open.
///
/// # Errors
///
/// Returns an error if a pragma, the base DDL, or a migration step fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    let journal_mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
    if !journal_mode.eq_ignore_ascii_case("wal") {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    if !base_schema_present(conn)? {
        apply_base_schema(conn)?;
    }
    MigrationRunner::new(conn).ensure_current(MigrationRegistry::builtin()?)?;

    Ok(())
}

fn base_schema_present(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM sqlite_master WHERE name = ?1")?;
    for name in BASE_OBJECTS {
        if !stmt.exists([*name])? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Apply only the base DDL, leaving every migration pending.
///
/// # Errors
///
/// Returns an error if the SQL execution fails.
pub fn apply_base_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::introspect::SchemaIntrospector;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"issues".to_string()));
        assert!(tables.contains(&"metadata".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));

        let schema = SchemaIntrospector::new(&conn);
        assert!(schema.column_exists("issues", "github_username").unwrap());
        assert!(schema.index_exists("idx_issues_team").unwrap());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_current_schema_opens_under_foreign_write_lock() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("tally.db");
        {
            let conn = Connection::open(&path).unwrap();
            apply_schema(&conn).unwrap();
        }

        let writer = Connection::open(&path).unwrap();
        writer
            .execute_batch(
                "BEGIN IMMEDIATE;
                 INSERT INTO metadata (key, value) VALUES ('held', 'yes');",
            )
            .unwrap();

        let reader = Connection::open(&path).unwrap();
        reader.busy_timeout(std::time::Duration::from_millis(50)).unwrap();
        apply_schema(&reader).expect("current schema needs no write lock");

        writer.execute_batch("ROLLBACK").unwrap();
    }

    #[test]
    fn test_base_schema_leaves_migrations_pending() {
        let conn = Connection::open_in_memory().unwrap();
        apply_base_schema(&conn).unwrap();

        let schema = SchemaIntrospector::new(&conn);
        assert!(!schema.column_exists("issues", "team").unwrap());
        assert!(!schema.column_exists("issues", "external_ref").unwrap());
    }

    #[test]
    fn test_priority_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO issues (id, title, priority, created_at, updated_at)
             VALUES ('t1', 'Test', 2, 0, 0)",
            [],
        );
        assert!(result.is_ok());

        let result = conn.execute(
            "INSERT INTO issues (id, title, priority, created_at, updated_at)
             VALUES ('t2', 'Test', 5, 0, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
