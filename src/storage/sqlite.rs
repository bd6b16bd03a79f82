//! SQLite storage implementation.
//!
//! This module provides the storage backend for tally. Reads go straight to
//! the connection; writes go through [`SqliteStorage::write`], which wraps
//! them in an IMMEDIATE transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Issue, IssueFilter};
use crate::storage::schema::apply_schema;

/// Metadata key: RFC 3339 time of the last successful JSONL import.
pub const META_LAST_IMPORT_TIME: &str = "last_import_time";
/// Metadata key: SHA-256 of the JSONL file at the last import.
pub const META_JSONL_HASH: &str = "jsonl_content_hash";

const ISSUE_COLUMNS: &str = "id, title, description, status, priority, issue_type, assignee, \
     github_username, team, last_synced_at, sync_source, created_at, updated_at";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database if needed and brings the schema current.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a
    /// migration fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        debug!(path = %path.display(), "Opened database");
        Ok(Self { conn })
    }

    /// Open an existing database, failing if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInitialized` if `path` does not exist.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotInitialized);
        }
        Self::open(path)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a write inside an IMMEDIATE transaction.
    ///
    /// Commits if `f` returns `Ok`, rolls back (on drop) otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn write<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let result = f(&tx)?;
        tx.commit()?;

        debug!(op, "Write committed");
        Ok(result)
    }

    // ==================
    // Issue Operations
    // ==================

    /// Search issues by free text and filter.
    ///
    /// An empty `query` matches everything. Results are ordered by
    /// priority, then creation time, then id, so repeated calls agree.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search_issues(&self, query: &str, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let mut sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params.push(Box::new(status));
        }

        let query = query.trim();
        if !query.is_empty() {
            sql.push_str(" AND (id LIKE ? OR title LIKE ? OR description LIKE ?)");
            let pattern = format!("%{query}%");
            for _ in 0..3 {
                params.push(Box::new(pattern.clone()));
            }
        }

        sql.push_str(" ORDER BY priority ASC, created_at ASC, id ASC");

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let context = |source| Error::query(describe_search(query, filter), source);

        let mut stmt = self.conn.prepare(&sql).map_err(context)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(AsRef::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), map_issue_row)
            .map_err(context)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(context)
    }

    /// Get an issue by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1");
        let issue = self
            .conn
            .query_row(&sql, [id], map_issue_row)
            .optional()?;
        Ok(issue)
    }

    /// Total number of issues in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_issues(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Insert or replace an issue inside an open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn upsert_issue(tx: &Transaction, issue: &Issue) -> Result<()> {
        tx.execute(
            "INSERT INTO issues (id, title, description, status, priority, issue_type, assignee,
                                 github_username, team, last_synced_at, sync_source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                status = excluded.status,
                priority = excluded.priority,
                issue_type = excluded.issue_type,
                assignee = excluded.assignee,
                github_username = excluded.github_username,
                team = excluded.team,
                last_synced_at = excluded.last_synced_at,
                sync_source = excluded.sync_source,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            rusqlite::params![
                issue.id,
                issue.title,
                issue.description,
                issue.status,
                issue.priority,
                issue.issue_type,
                issue.assignee,
                issue.github_username,
                issue.team,
                issue.last_synced_at,
                issue.sync_source,
                issue.created_at,
                issue.updated_at,
            ],
        )?;
        Ok(())
    }

    // ==================
    // Metadata
    // ==================

    /// Read a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a metadata value inside an open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn set_metadata(tx: &Transaction, key: &str, value: &str) -> Result<()> {
        tx.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Time of the last recorded JSONL import, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored value is not RFC 3339.
    pub fn last_import_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_metadata(META_LAST_IMPORT_TIME)?
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| Error::Sync(format!("invalid {META_LAST_IMPORT_TIME} {raw:?}: {e}")))
            })
            .transpose()
    }
}

/// Label for a search, e.g. `search issues (status=in_progress)`.
fn describe_search(query: &str, filter: &IssueFilter) -> String {
    let mut parts = Vec::new();
    if let Some(status) = filter.status {
        parts.push(format!("status={status}"));
    }
    if !query.is_empty() {
        parts.push(format!("query={query:?}"));
    }
    if let Some(limit) = filter.limit {
        parts.push(format!("limit={limit}"));
    }

    if parts.is_empty() {
        "search issues".to_string()
    } else {
        format!("search issues ({})", parts.join(", "))
    }
}

// Helper to map issue rows
fn map_issue_row(row: &rusqlite::Row) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        issue_type: row.get(5)?,
        assignee: row.get(6)?,
        github_username: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        team: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        last_synced_at: row.get(9)?,
        sync_source: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
