//! Migrate command: run or plan the schema migrations.

use colored::Colorize;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::schema::apply_base_schema;
use crate::storage::{MigrationRegistry, MigrationReport, MigrationRunner};

/// Run (or with `dry_run`, plan) the built-in migrations up to `to`.
///
/// Opens the file without the automatic upgrade `SqliteStorage::open`
/// performs, so the report shows what this invocation changed.
///
/// # Errors
///
/// Returns `Error::NotInitialized` if the database does not exist, or
/// `Error::Migration` for the first step that fails.
pub fn run(db_path: &Path, dry_run: bool, to: Option<u32>) -> Result<MigrationReport> {
    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    let builtin = MigrationRegistry::builtin()?;
    let registry = match to {
        Some(version) if version > builtin.latest_version() => {
            return Err(Error::InvalidArgument(format!(
                "no migration {version}; latest is {}",
                builtin.latest_version()
            )));
        }
        Some(version) => builtin.through(version),
        None => builtin.clone(),
    };

    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    let runner = MigrationRunner::new(&conn);

    if dry_run {
        runner.plan(&registry)
    } else {
        apply_base_schema(&conn)?;
        runner.run(&registry)
    }
}

/// Execute the migrate command.
///
/// # Errors
///
/// Returns an error if migration fails or output cannot be serialized.
pub fn execute(db_path: &Path, dry_run: bool, to: Option<u32>, json: bool) -> Result<()> {
    let report = run(db_path, dry_run, to)?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    if !report.changed() {
        println!("Schema is up to date (version {})", report.latest_version);
        return Ok(());
    }

    let verb = if report.dry_run { "Would add" } else { "Added" };
    for step in report.steps.iter().filter(|s| !s.is_noop()) {
        println!("{} {}", format!("v{}", step.version).cyan(), step.name.bold());
        for column in &step.added_columns {
            println!("  {verb} column {column}");
        }
        for index in &step.created_indexes {
            println!("  {verb} index {index}");
        }
    }
    println!(
        "\n{verb} {} column(s) and {} index(es); schema version {}",
        report.column_count(),
        report.index_count(),
        report.latest_version
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SchemaIntrospector;
    use tempfile::TempDir;

    fn base_only_db(temp_dir: &TempDir) -> std::path::PathBuf {
        let path = temp_dir.path().join("tally.db");
        let conn = Connection::open(&path).unwrap();
        apply_base_schema(&conn).unwrap();
        path
    }

    #[test]
    fn test_missing_db() {
        let temp_dir = TempDir::new().unwrap();
        let err = run(&temp_dir.path().join("nope.db"), false, None).unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[test]
    fn test_dry_run_then_run_then_noop() {
        let temp_dir = TempDir::new().unwrap();
        let path = base_only_db(&temp_dir);

        let plan = run(&path, true, None).unwrap();
        assert!(plan.dry_run);
        assert_eq!(plan.column_count(), 7);
        assert_eq!(plan.index_count(), 3);

        let applied = run(&path, false, None).unwrap();
        assert_eq!(applied.column_count(), 7);

        let again = run(&path, false, None).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn test_run_to_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = base_only_db(&temp_dir);

        let report = run(&path, false, Some(1)).unwrap();
        assert_eq!(report.latest_version, 1);

        let conn = Connection::open(&path).unwrap();
        let schema = SchemaIntrospector::new(&conn);
        assert!(schema.column_exists("issues", "external_ref").unwrap());
        assert!(!schema.column_exists("issues", "github_username").unwrap());
    }

    #[test]
    fn test_unknown_target_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = base_only_db(&temp_dir);
        let err = run(&path, false, Some(99)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
