//! Live schema catalog queries.
//!
//! The migration runner never trusts its own ledger to decide what exists;
//! it asks SQLite through this type instead.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

/// Read-only view over `sqlite_master` and `pragma_table_info`.
pub struct SchemaIntrospector<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaIntrospector<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Check if a column exists in a table.
    ///
    /// # Errors
    ///
    /// Returns an error if `table` is not a plain identifier or the query fails.
    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        validate_identifier(table)?;
        let sql = format!("SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?1");
        Ok(self.conn.prepare(&sql)?.exists([column])?)
    }

    /// Column names of a table, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if `table` is not a plain identifier or the query fails.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        validate_identifier(table)?;
        let sql = format!("SELECT name FROM pragma_table_info('{table}') ORDER BY cid");
        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Check if a table with this name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        Ok(stmt.exists([name])?)
    }

    /// Check if an index with this name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn index_exists(&self, name: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1")?;
        Ok(stmt.exists([name])?)
    }

    /// The `CREATE INDEX` statement SQLite recorded for an index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn index_sql(&self, name: &str) -> Result<Option<String>> {
        let sql = self
            .conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [name],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(sql.flatten())
    }
}

/// Reject anything that is not `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Table, column and index names are interpolated into DDL, which cannot
/// be parameterised.
///
/// # Errors
///
/// Returns `Error::InvalidIdentifier` for any other shape.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}
