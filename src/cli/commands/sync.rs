//! Sync command implementations (JSONL import).
//!
//! The JSONL file sits beside the database (`.tally/issues.jsonl`) so it
//! can be committed to git with the project.

use std::path::{Path, PathBuf};

use crate::cli::SyncCommands;
use crate::config::jsonl_path_for;
use crate::error::Result;
use crate::storage::SqliteStorage;
use crate::sync::Importer;

/// Execute sync commands.
///
/// # Errors
///
/// Returns an error if the database is missing or the import fails.
pub fn execute(command: &SyncCommands, db_path: &Path, json: bool) -> Result<()> {
    match command {
        SyncCommands::Import { input } => import(db_path, input.as_ref(), json),
    }
}

fn import(db_path: &Path, input: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut storage = SqliteStorage::open_existing(db_path)?;
    let input = input.cloned().unwrap_or_else(|| jsonl_path_for(db_path));

    let stats = Importer::new(&mut storage).import(&input)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Import complete from: {}", input.display());
        println!();
        println!("  Read:    {}", stats.read);
        println!("  Created: {}", stats.created);
        println!("  Updated: {}", stats.updated);
    }

    Ok(())
}
