//! Initialize a tally workspace.
//!
//! - **Project init (`tally init`)**: creates `.tally/` in the current
//!   directory with the database and a `.gitignore` that keeps the JSONL
//!   file tracked and everything else local.
//! - **Global init (`tally init --global`)**: the same layout in `~/.tally/`.
//! - With `--db PATH`, initializes the directory containing `PATH`.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{DB_FILE, TALLY_DIR, global_tally_dir, jsonl_path_for};
use crate::error::{Error, Result};
use crate::storage::{MigrationRegistry, SqliteStorage};

const GITIGNORE: &str = "# tally: track issues.jsonl, keep the database local\n\
*.db\n\
*.db-wal\n\
*.db-shm\n\
daemon.sock\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    path: PathBuf,
    database: PathBuf,
    jsonl: PathBuf,
    schema_version: u32,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `Error::AlreadyInitialized` if the database exists and `force`
/// is not set, or an error if the directory or database cannot be created.
pub fn execute(global: bool, force: bool, explicit_db: Option<&Path>, json: bool) -> Result<()> {
    let db_path = target_db_path(global, explicit_db)?;
    let output = init_at(&db_path, force)?;

    if json {
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
    } else {
        println!("Initialized tally in {}", output.path.display());
        println!("  Database: {}", output.database.display());
        println!("  Sync file: {}", output.jsonl.display());
    }

    Ok(())
}

fn target_db_path(global: bool, explicit_db: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_db {
        return Ok(path.to_path_buf());
    }
    let base_dir = if global {
        global_tally_dir().ok_or_else(|| {
            Error::Config("Could not determine global tally directory".to_string())
        })?
    } else {
        Path::new(".").join(TALLY_DIR)
    };
    Ok(base_dir.join(DB_FILE))
}

fn init_at(db_path: &Path, force: bool) -> Result<InitOutput> {
    if db_path.exists() && !force {
        return Err(Error::AlreadyInitialized {
            path: db_path.to_path_buf(),
        });
    }

    let base_dir = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    fs::create_dir_all(&base_dir)?;

    if force {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = db_path.as_os_str().to_owned();
            path.push(suffix);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    // Opening creates the file and applies the full schema.
    drop(SqliteStorage::open(db_path)?);

    let gitignore_path = base_dir.join(".gitignore");
    if !gitignore_path.exists() || force {
        fs::write(&gitignore_path, GITIGNORE)?;
    }

    Ok(InitOutput {
        path: base_dir,
        database: db_path.to_path_buf(),
        jsonl: jsonl_path_for(db_path),
        schema_version: MigrationRegistry::builtin()?.latest_version(),
    })
}
