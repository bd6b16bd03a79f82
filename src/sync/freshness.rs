//! Staleness guard for direct database reads.
//!
//! When no daemon is running the CLI reads SQLite directly. If the JSONL
//! file was edited after the last import (a `git pull`, a teammate's merge)
//! the database no longer reflects it, and reading would silently show old
//! data. A newer mtime alone is not enough: `git checkout` touches files
//! without changing them, so the content hash must differ too.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::storage::sqlite::{META_JSONL_HASH, SqliteStorage};
use crate::sync::file::modified_time;
use crate::sync::hash::{content_hash, has_changed};

/// Outcome of a freshness assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale {
        jsonl_modified: DateTime<Utc>,
        last_import: DateTime<Utc>,
    },
}

impl Freshness {
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

/// Compares the JSONL file against the import metadata in the store.
#[derive(Debug, Clone)]
pub struct FreshnessGuard {
    jsonl_path: PathBuf,
    allow_stale: bool,
}

impl FreshnessGuard {
    #[must_use]
    pub fn new(jsonl_path: impl Into<PathBuf>, allow_stale: bool) -> Self {
        Self {
            jsonl_path: jsonl_path.into(),
            allow_stale,
        }
    }

    /// Decide whether the store reflects the JSONL file.
    ///
    /// Fresh when the file is missing, nothing was ever imported, the file
    /// is older than the last import, or its bytes hash to the value
    /// recorded at import time. An mtime equal to the import time still
    /// gets a hash comparison.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or the metadata cannot be read.
    pub fn assess(&self, storage: &SqliteStorage) -> Result<Freshness> {
        let Some(jsonl_modified) = modified_time(&self.jsonl_path)? else {
            debug!(path = %self.jsonl_path.display(), "No JSONL file, skipping freshness check");
            return Ok(Freshness::Fresh);
        };

        let Some(last_import) = storage.last_import_time()? else {
            debug!("No import recorded, skipping freshness check");
            return Ok(Freshness::Fresh);
        };

        if jsonl_modified < last_import {
            return Ok(Freshness::Fresh);
        }

        let current = content_hash(&fs::read(&self.jsonl_path)?);
        let stored = storage.get_metadata(META_JSONL_HASH)?;
        if !has_changed(&current, stored.as_deref()) {
            debug!("JSONL touched but content unchanged");
            return Ok(Freshness::Fresh);
        }

        Ok(Freshness::Stale {
            jsonl_modified,
            last_import,
        })
    }

    /// Refuse stale reads unless `--allow-stale` was given.
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseStale` when the store is stale and stale
    /// reads are not allowed.
    pub fn check(&self, storage: &SqliteStorage) -> Result<()> {
        match self.assess(storage)? {
            Freshness::Fresh => Ok(()),
            Freshness::Stale {
                jsonl_modified,
                last_import,
            } => {
                if self.allow_stale {
                    warn!(
                        jsonl_modified = %jsonl_modified,
                        last_import = %last_import,
                        "Database is stale, continuing because --allow-stale is set"
                    );
                    Ok(())
                } else {
                    Err(Error::DatabaseStale {
                        jsonl_path: self.jsonl_path.clone(),
                    })
                }
            }
        }
    }
}
