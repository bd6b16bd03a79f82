//! JSONL import.
//!
//! Loads `issues.jsonl` into the store and stamps the freshness metadata
//! that [`FreshnessGuard`](super::FreshnessGuard) later compares against.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::Issue;
use crate::storage::sqlite::{META_JSONL_HASH, META_LAST_IMPORT_TIME, SqliteStorage};
use crate::sync::file::{modified_time, parse_jsonl};
use crate::sync::hash::content_hash;

/// Sync source recorded on issues imported from the local JSONL file.
pub const LOCAL_SYNC_SOURCE: &str = "local";

/// Counts from one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub path: PathBuf,
    pub read: usize,
    pub created: usize,
    pub updated: usize,
    pub content_hash: String,
}

/// Importer for the issues JSONL file.
pub struct Importer<'a> {
    storage: &'a mut SqliteStorage,
}

impl<'a> Importer<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage) -> Self {
        Self { storage }
    }

    /// Import every issue in `path` in a single transaction.
    ///
    /// Issues without a sync stamp get `last_synced_at = now` and
    /// `sync_source = "local"`. On success the file's hash is recorded
    /// together with its mtime as observed before reading, so a rewrite
    /// that lands while the import runs still looks newer than the import.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a line is invalid, or
    /// the write fails. Nothing is written on error.
    pub fn import(&mut self, path: &Path) -> Result<ImportStats> {
        if !path.exists() {
            return Err(Error::Sync(format!("JSONL file not found: {}", path.display())));
        }

        let now = Utc::now();
        let read_at = modified_time(path)?.unwrap_or(now);
        let content = fs::read_to_string(path)?;
        let hash = content_hash(content.as_bytes());
        let mut issues: Vec<Issue> = parse_jsonl(&content)?;

        for issue in &mut issues {
            if issue.last_synced_at.is_none() {
                issue.last_synced_at = Some(now);
            }
            if issue.sync_source.is_empty() {
                issue.sync_source = LOCAL_SYNC_SOURCE.to_string();
            }
        }

        let mut stats = ImportStats {
            path: path.to_path_buf(),
            read: issues.len(),
            content_hash: hash.clone(),
            ..ImportStats::default()
        };

        let (created, updated) = self.storage.write("import", |tx| {
            let mut created = 0;
            let mut updated = 0;
            for issue in &issues {
                let exists = tx
                    .prepare_cached("SELECT 1 FROM issues WHERE id = ?1")?
                    .exists([&issue.id])?;
                SqliteStorage::upsert_issue(tx, issue)?;
                if exists {
                    updated += 1;
                } else {
                    created += 1;
                }
            }

            SqliteStorage::set_metadata(
                tx,
                META_LAST_IMPORT_TIME,
                &read_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            )?;
            SqliteStorage::set_metadata(tx, META_JSONL_HASH, &hash)?;
            Ok((created, updated))
        })?;

        stats.created = created;
        stats.updated = updated;
        info!(
            path = %path.display(),
            read = stats.read,
            created,
            updated,
            "Import complete"
        );
        Ok(stats)
    }
}
