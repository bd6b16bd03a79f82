//! Additive, idempotent schema migrations.
//!
//! Every step only adds: columns via `ALTER TABLE ... ADD COLUMN` and indexes
//! via `CREATE INDEX IF NOT EXISTS`. Before each column is added the live
//! catalog is consulted, so a step that was interrupted halfway is finished
//! by the next run and a step that already landed is a no-op.
//!
//! The `schema_migrations` table is a ledger for humans and `tally migrate`
//! output. It is never consulted to skip a schema change, only to avoid
//! rewriting rows that are already there. A database that is already
//! current is brought up to date without taking a write lock.

use std::sync::OnceLock;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use super::introspect::{validate_identifier, SchemaIntrospector};
use crate::error::{Error, Result};

/// A column to add, with its SQL type and default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// Everything after the column name in `ADD COLUMN`, e.g. `TEXT DEFAULT ''`.
    pub definition: &'static str,
}

/// An index to create, optionally partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub column: &'static str,
    /// Partial-index predicate, e.g. `team != ''`.
    pub predicate: Option<&'static str>,
}

impl IndexSpec {
    /// `CREATE INDEX IF NOT EXISTS` statement for this index.
    #[must_use]
    pub fn create_sql(&self) -> String {
        let mut sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({})",
            self.name, self.table, self.column
        );
        if let Some(predicate) = self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
    }
}

/// One versioned unit of schema evolution against a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStep {
    pub version: u32,
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [ColumnSpec],
    pub indexes: &'static [IndexSpec],
}

/// Built-in steps in the order they shipped.
pub const BUILTIN_STEPS: &[MigrationStep] = &[
    MigrationStep {
        version: 1,
        name: "external_ref",
        table: "issues",
        columns: &[ColumnSpec {
            name: "external_ref",
            definition: "TEXT",
        }],
        indexes: &[IndexSpec {
            name: "idx_issues_external_ref",
            table: "issues",
            column: "external_ref",
            predicate: Some("external_ref IS NOT NULL"),
        }],
    },
    MigrationStep {
        version: 2,
        name: "compaction_columns",
        table: "issues",
        columns: &[
            ColumnSpec {
                name: "compaction_level",
                definition: "INTEGER DEFAULT 0",
            },
            ColumnSpec {
                name: "compacted_at",
                definition: "TIMESTAMP",
            },
        ],
        indexes: &[],
    },
    MigrationStep {
        version: 3,
        name: "team_collaboration_columns",
        table: "issues",
        columns: &[
            ColumnSpec {
                name: "github_username",
                definition: "TEXT DEFAULT ''",
            },
            ColumnSpec {
                name: "team",
                definition: "TEXT DEFAULT ''",
            },
            ColumnSpec {
                name: "last_synced_at",
                definition: "TIMESTAMP",
            },
            ColumnSpec {
                name: "sync_source",
                definition: "TEXT DEFAULT ''",
            },
        ],
        indexes: &[
            IndexSpec {
                name: "idx_issues_github_username",
                table: "issues",
                column: "github_username",
                predicate: Some("github_username != ''"),
            },
            IndexSpec {
                name: "idx_issues_team",
                table: "issues",
                column: "team",
                predicate: Some("team != ''"),
            },
        ],
    },
];

/// The ordered, validated list of steps a runner applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRegistry {
    steps: Vec<MigrationStep>,
}

static BUILTIN: OnceLock<MigrationRegistry> = OnceLock::new();

impl MigrationRegistry {
    /// Build a registry, rejecting non-ascending versions and bad identifiers.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRegistry` if versions are not strictly
    /// ascending, or `Error::InvalidIdentifier` for an unsafe name.
    pub fn new(steps: Vec<MigrationStep>) -> Result<Self> {
        for pair in steps.windows(2) {
            if pair[1].version <= pair[0].version {
                return Err(Error::InvalidRegistry(format!(
                    "step {} ({}) must come after step {} ({})",
                    pair[0].version, pair[0].name, pair[1].version, pair[1].name
                )));
            }
        }

        for step in &steps {
            validate_identifier(step.table)?;
            for column in step.columns {
                validate_identifier(column.name)?;
            }
            for index in step.indexes {
                validate_identifier(index.name)?;
                validate_identifier(index.table)?;
                validate_identifier(index.column)?;
            }
        }

        Ok(Self { steps })
    }

    /// The process-wide registry of built-in steps.
    ///
    /// Validated and built on first use, never mutated afterwards.
    ///
    /// # Errors
    ///
    /// Returns the validation error from [`new`](Self::new) if the built-in
    /// steps are malformed.
    pub fn builtin() -> Result<&'static Self> {
        if let Some(registry) = BUILTIN.get() {
            return Ok(registry);
        }
        let registry = Self::new(BUILTIN_STEPS.to_vec())?;
        Ok(BUILTIN.get_or_init(|| registry))
    }

    #[must_use]
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Highest version in the registry, 0 when empty.
    #[must_use]
    pub fn latest_version(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.version)
    }

    /// Registry holding only the steps up to and including `version`.
    #[must_use]
    pub fn through(&self, version: u32) -> Self {
        Self {
            steps: self
                .steps
                .iter()
                .take_while(|s| s.version <= version)
                .copied()
                .collect(),
        }
    }
}

/// What one step changed (or, for a plan, would change).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub version: u32,
    pub name: String,
    pub added_columns: Vec<String>,
    pub created_indexes: Vec<String>,
}

impl StepReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added_columns.is_empty() && self.created_indexes.is_empty()
    }
}

/// Outcome of a runner pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub latest_version: u32,
    pub steps: Vec<StepReport>,
}

impl MigrationReport {
    /// Returns true if any step added a column or index.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|s| !s.is_noop())
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.steps.iter().map(|s| s.added_columns.len()).sum()
    }

    #[must_use]
    pub fn index_count(&self) -> usize {
        self.steps.iter().map(|s| s.created_indexes.len()).sum()
    }
}

/// Applies a [`MigrationRegistry`] to one connection.
///
/// Assumes exclusive access to the database for the duration of a run.
pub struct MigrationRunner<'a> {
    conn: &'a Connection,
}

impl<'a> MigrationRunner<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Apply every step in ascending version order.
    ///
    /// Stops at the first failure. Steps before it stay applied; the next
    /// run picks up where this one stopped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Migration` naming the version, action and
    /// column/index that failed.
    pub fn run(&self, registry: &MigrationRegistry) -> Result<MigrationReport> {
        let ledger_exists = SchemaIntrospector::new(self.conn)
            .table_exists("schema_migrations")
            .map_err(|e| wrap(e, 0, "check", "schema_migrations"))?;
        if !ledger_exists {
            self.conn
                .execute(
                    "CREATE TABLE schema_migrations (
                        version INTEGER PRIMARY KEY,
                        name TEXT NOT NULL,
                        applied_at INTEGER NOT NULL
                    )",
                    [],
                )
                .map_err(|source| Error::Migration {
                    version: 0,
                    action: "create",
                    target: "schema_migrations".to_string(),
                    source,
                })?;
        }

        let mut report = MigrationReport {
            dry_run: false,
            latest_version: registry.latest_version(),
            steps: Vec::with_capacity(registry.steps().len()),
        };

        for step in registry.steps() {
            let step_report = self.apply_step(step, false)?;
            self.record(step)?;

            if step_report.is_noop() {
                debug!(version = step.version, name = step.name, "Migration already applied");
            } else {
                info!(
                    version = step.version,
                    name = step.name,
                    columns = step_report.added_columns.len(),
                    indexes = step_report.created_indexes.len(),
                    "Migration complete"
                );
            }
            report.steps.push(step_report);
        }

        Ok(report)
    }

    /// Run the registry only if the catalog or the ledger is behind.
    ///
    /// A current database is checked with reads alone, so opening it does
    /// not contend with another writer. Returns `None` when nothing ran.
    ///
    /// # Errors
    ///
    /// Returns `Error::Migration` if the catalog cannot be read or a step
    /// fails.
    pub fn ensure_current(&self, registry: &MigrationRegistry) -> Result<Option<MigrationReport>> {
        let plan = self.plan(registry)?;
        if !plan.changed() && self.ledger_complete(registry)? {
            debug!(version = registry.latest_version(), "Schema is current");
            return Ok(None);
        }
        self.run(registry).map(Some)
    }

    /// Report what [`run`](Self::run) would change, without writing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Migration` if the catalog cannot be read.
    pub fn plan(&self, registry: &MigrationRegistry) -> Result<MigrationReport> {
        let steps = registry
            .steps()
            .iter()
            .map(|step| self.apply_step(step, true))
            .collect::<Result<Vec<_>>>()?;

        Ok(MigrationReport {
            dry_run: true,
            latest_version: registry.latest_version(),
            steps,
        })
    }

    fn apply_step(&self, step: &MigrationStep, dry_run: bool) -> Result<StepReport> {
        let schema = SchemaIntrospector::new(self.conn);
        let mut report = StepReport {
            version: step.version,
            name: step.name.to_string(),
            ..StepReport::default()
        };

        for column in step.columns {
            let exists = schema
                .column_exists(step.table, column.name)
                .map_err(|e| wrap(e, step.version, "check", column.name))?;
            if exists {
                continue;
            }

            if !dry_run {
                info!(version = step.version, table = step.table, column = column.name, "Adding column");
                self.conn
                    .execute(
                        &format!(
                            "ALTER TABLE {} ADD COLUMN {} {}",
                            step.table, column.name, column.definition
                        ),
                        [],
                    )
                    .map_err(|source| Error::Migration {
                        version: step.version,
                        action: "add column",
                        target: column.name.to_string(),
                        source,
                    })?;
            }
            report.added_columns.push(column.name.to_string());
        }

        for index in step.indexes {
            let exists = schema
                .index_exists(index.name)
                .map_err(|e| wrap(e, step.version, "check", index.name))?;

            if exists {
                continue;
            }

            if !dry_run {
                self.conn
                    .execute(&index.create_sql(), [])
                    .map_err(|source| Error::Migration {
                        version: step.version,
                        action: "create index",
                        target: index.name.to_string(),
                        source,
                    })?;
            }
            report.created_indexes.push(index.name.to_string());
        }

        Ok(report)
    }

    /// True when every step in `registry` has a ledger row.
    fn ledger_complete(&self, registry: &MigrationRegistry) -> Result<bool> {
        let ledger_exists = SchemaIntrospector::new(self.conn)
            .table_exists("schema_migrations")
            .map_err(|e| wrap(e, 0, "check", "schema_migrations"))?;
        if !ledger_exists {
            return Ok(false);
        }

        for step in registry.steps() {
            if !self.is_recorded(step)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn is_recorded(&self, step: &MigrationStep) -> Result<bool> {
        self.conn
            .prepare_cached("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .and_then(|mut stmt| stmt.exists([step.version]))
            .map_err(|source| Error::Migration {
                version: step.version,
                action: "check",
                target: "schema_migrations".to_string(),
                source,
            })
    }

    fn record(&self, step: &MigrationStep) -> Result<()> {
        if self.is_recorded(step)? {
            return Ok(());
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![step.version, step.name, chrono::Utc::now().timestamp_millis()],
            )
            .map_err(|source| Error::Migration {
                version: step.version,
                action: "record",
                target: "schema_migrations".to_string(),
                source,
            })?;
        Ok(())
    }
}

fn wrap(err: Error, version: u32, action: &'static str, target: &str) -> Error {
    match err {
        Error::Database(source) => Error::Migration {
            version,
            action,
            target: target.to_string(),
            source,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_base_schema;

    fn base_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_base_schema(&conn).expect("Base schema should apply");
        conn
    }

    /// Everything in `sqlite_master` except the ledger, for schema comparison.
    fn schema_dump(conn: &Connection) -> Vec<(String, String, Option<String>)> {
        conn.prepare(
            "SELECT type, name, sql FROM sqlite_master
             WHERE name != 'schema_migrations' ORDER BY type, name",
        )
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
    }

    #[test]
    fn test_builtin_registry_is_valid() {
        let registry = MigrationRegistry::new(BUILTIN_STEPS.to_vec()).expect("builtin steps validate");
        assert_eq!(&registry, MigrationRegistry::builtin().unwrap());
        assert_eq!(registry.latest_version(), 3);
    }

    #[test]
    fn test_registry_rejects_out_of_order_steps() {
        let mut steps = BUILTIN_STEPS.to_vec();
        steps.swap(0, 1);
        let err = MigrationRegistry::new(steps).unwrap_err();
        assert!(matches!(err, Error::InvalidRegistry(_)));

        let dup = vec![BUILTIN_STEPS[0], BUILTIN_STEPS[0]];
        assert!(MigrationRegistry::new(dup).is_err());
    }

    #[test]
    fn test_registry_rejects_unsafe_identifier() {
        const BAD: &[ColumnSpec] = &[ColumnSpec {
            name: "team; DROP TABLE issues",
            definition: "TEXT",
        }];
        let step = MigrationStep {
            version: 1,
            name: "bad",
            table: "issues",
            columns: BAD,
            indexes: &[],
        };
        let err = MigrationRegistry::new(vec![step]).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn test_index_create_sql() {
        let sql = BUILTIN_STEPS[2].indexes[1].create_sql();
        assert_eq!(
            sql,
            "CREATE INDEX IF NOT EXISTS idx_issues_team ON issues(team) WHERE team != ''"
        );
    }

    #[test]
    fn test_run_on_fresh_db_adds_everything() {
        let conn = base_db();
        let report = MigrationRunner::new(&conn).run(MigrationRegistry::builtin().unwrap()).unwrap();

        assert!(report.changed());
        assert_eq!(report.column_count(), 7);
        assert_eq!(report.index_count(), 3);

        let recorded: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(recorded, 3);
    }

    #[test]
    fn test_run_twice_is_idempotent() {
        let conn = base_db();
        let runner = MigrationRunner::new(&conn);

        runner.run(MigrationRegistry::builtin().unwrap()).expect("First run should succeed");
        let after_first = schema_dump(&conn);

        let second = runner
            .run(MigrationRegistry::builtin().unwrap())
            .expect("Second run should succeed (idempotent)");
        assert!(!second.changed());
        assert_eq!(schema_dump(&conn), after_first);
    }

    #[test]
    fn test_interrupted_sequence_resumes_to_same_schema() {
        let reference = base_db();
        MigrationRunner::new(&reference).run(MigrationRegistry::builtin().unwrap()).unwrap();
        let expected = schema_dump(&reference);

        for k in 0..=MigrationRegistry::builtin().unwrap().latest_version() {
            let conn = base_db();
            let runner = MigrationRunner::new(&conn);
            runner.run(&MigrationRegistry::builtin().unwrap().through(k)).unwrap();
            runner.run(MigrationRegistry::builtin().unwrap()).unwrap();
            assert_eq!(schema_dump(&conn), expected, "resumed after step {k}");
        }
    }

    #[test]
    fn test_half_applied_step_self_heals() {
        let conn = base_db();
        let runner = MigrationRunner::new(&conn);
        runner.run(&MigrationRegistry::builtin().unwrap().through(2)).unwrap();

        // Crash after two of step 3's columns, before its indexes
        conn.execute_batch(
            "ALTER TABLE issues ADD COLUMN github_username TEXT DEFAULT '';
             ALTER TABLE issues ADD COLUMN team TEXT DEFAULT '';",
        )
        .unwrap();

        let report = runner.run(MigrationRegistry::builtin().unwrap()).unwrap();
        let step3 = &report.steps[2];
        assert_eq!(step3.added_columns, vec!["last_synced_at", "sync_source"]);
        assert_eq!(
            step3.created_indexes,
            vec!["idx_issues_github_username", "idx_issues_team"]
        );
    }

    #[test]
    fn test_existing_github_username_only_adds_the_rest() {
        let conn = base_db();
        let runner = MigrationRunner::new(&conn);
        runner.run(&MigrationRegistry::builtin().unwrap().through(2)).unwrap();
        conn.execute("ALTER TABLE issues ADD COLUMN github_username TEXT DEFAULT ''", [])
            .unwrap();

        let report = runner.run(MigrationRegistry::builtin().unwrap()).expect("pre-existing column is not an error");

        assert!(report.steps[0].is_noop());
        assert!(report.steps[1].is_noop());
        assert_eq!(
            report.steps[2].added_columns,
            vec!["team", "last_synced_at", "sync_source"]
        );
        assert_eq!(report.steps[2].created_indexes.len(), 2);
    }

    #[test]
    fn test_failure_aborts_remaining_steps() {
        const GOOD: &[ColumnSpec] = &[ColumnSpec {
            name: "alpha",
            definition: "TEXT DEFAULT ''",
        }];
        // SQLite refuses NOT NULL without a default on ADD COLUMN
        const BROKEN: &[ColumnSpec] = &[ColumnSpec {
            name: "beta",
            definition: "TEXT NOT NULL",
        }];
        const LATER: &[ColumnSpec] = &[ColumnSpec {
            name: "gamma",
            definition: "TEXT DEFAULT ''",
        }];
        let step = |version, columns| MigrationStep {
            version,
            name: "test",
            table: "issues",
            columns,
            indexes: &[],
        };
        let registry =
            MigrationRegistry::new(vec![step(1, GOOD), step(2, BROKEN), step(3, LATER)]).unwrap();

        let conn = base_db();
        let err = MigrationRunner::new(&conn).run(&registry).unwrap_err();
        match err {
            Error::Migration {
                version,
                action,
                target,
                ..
            } => {
                assert_eq!(version, 2);
                assert_eq!(action, "add column");
                assert_eq!(target, "beta");
            }
            other => panic!("expected migration error, got {other:?}"),
        }

        let schema = SchemaIntrospector::new(&conn);
        assert!(schema.column_exists("issues", "alpha").unwrap());
        assert!(!schema.column_exists("issues", "gamma").unwrap());
    }

    #[test]
    fn test_plan_does_not_write() {
        let conn = base_db();
        let runner = MigrationRunner::new(&conn);
        let before = schema_dump(&conn);

        let plan = runner.plan(MigrationRegistry::builtin().unwrap()).unwrap();
        assert!(plan.dry_run);
        assert_eq!(plan.column_count(), 7);
        assert_eq!(plan.index_count(), 3);
        assert_eq!(schema_dump(&conn), before);

        runner.run(MigrationRegistry::builtin().unwrap()).unwrap();
        assert!(!runner.plan(MigrationRegistry::builtin().unwrap()).unwrap().changed());
    }

    #[test]
    fn test_ensure_current_skips_writes_when_up_to_date() {
        let conn = base_db();
        let runner = MigrationRunner::new(&conn);
        let registry = MigrationRegistry::builtin().unwrap();

        let first = runner.ensure_current(registry).unwrap();
        assert!(first.is_some_and(|report| report.changed()));

        conn.execute("UPDATE schema_migrations SET applied_at = 1", [])
            .unwrap();
        assert!(runner.ensure_current(registry).unwrap().is_none());

        let rewritten: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM schema_migrations WHERE applied_at != 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rewritten, 0);
    }

    #[test]
    fn test_ensure_current_restores_missing_ledger_rows() {
        let conn = base_db();
        let runner = MigrationRunner::new(&conn);
        let registry = MigrationRegistry::builtin().unwrap();
        runner.run(registry).unwrap();

        let applied_at = |version: u32| -> i64 {
            conn.query_row(
                "SELECT applied_at FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .unwrap()
        };
        conn.execute("UPDATE schema_migrations SET applied_at = 1 WHERE version = 1", [])
            .unwrap();
        conn.execute("DELETE FROM schema_migrations WHERE version = 2", [])
            .unwrap();

        let report = runner.ensure_current(registry).unwrap().unwrap();
        assert!(!report.changed());
        // Existing rows are left alone; only the gap is filled
        assert_eq!(applied_at(1), 1);
        assert!(applied_at(2) > 1);
    }

    #[test]
    fn test_partial_index_excludes_empty_values() {
        let conn = base_db();
        MigrationRunner::new(&conn).run(MigrationRegistry::builtin().unwrap()).unwrap();
        conn.execute_batch(
            "INSERT INTO issues (id, title, created_at, updated_at, github_username)
                 VALUES ('BD-1', 'one', 0, 0, 'alice');
             INSERT INTO issues (id, title, created_at, updated_at, github_username)
                 VALUES ('BD-2', 'two', 0, 0, '');
             INSERT INTO issues (id, title, created_at, updated_at)
                 VALUES ('BD-3', 'three', 0, 0);",
        )
        .unwrap();

        let plan_detail = |sql: &str| -> String {
            conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))
                .unwrap()
                .query_map([], |row| row.get::<_, String>(3))
                .unwrap()
                .collect::<std::result::Result<Vec<_>, _>>()
                .unwrap()
                .join("\n")
        };

        // Non-empty lookups can use the partial index
        let non_empty = plan_detail(
            "SELECT id FROM issues WHERE github_username = 'alice' AND github_username != ''",
        );
        assert!(non_empty.contains("idx_issues_github_username"), "{non_empty}");

        // Empty-value lookups cannot: those rows are not in the index
        let empty = plan_detail("SELECT id FROM issues WHERE github_username = ''");
        assert!(!empty.contains("idx_issues_github_username"), "{empty}");
        assert!(
            conn.prepare(
                "SELECT id FROM issues INDEXED BY idx_issues_github_username WHERE github_username = ''"
            )
            .is_err()
        );

        let via_index: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM issues INDEXED BY idx_issues_github_username
                 WHERE github_username = 'alice' AND github_username != ''",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(via_index, 1);
    }
}
