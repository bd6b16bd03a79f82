//! JSONL file helpers for sync.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Parse JSONL content, one record per line.
///
/// Blank lines are skipped. Invalid lines cause an error with the line
/// number for debugging.
///
/// # Errors
///
/// Returns `Error::Sync` naming the first line that fails to parse.
pub fn parse_jsonl<T: DeserializeOwned>(content: &str) -> Result<Vec<T>> {
    let mut records = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(line)
            .map_err(|e| Error::Sync(format!("invalid record at line {}: {e}", line_num + 1)))?;
        records.push(record);
    }

    Ok(records)
}

/// Last-modified time of a file, or `None` if it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but its metadata cannot be read.
pub fn modified_time(path: &Path) -> Result<Option<DateTime<Utc>>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: String,
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let rows: Vec<Row> = parse_jsonl("{\"id\":\"a\"}\n\n   \n{\"id\":\"b\"}\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id, "b");
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = parse_jsonl::<Row>("{\"id\":\"a\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_modified_time() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("issues.jsonl");
        assert!(modified_time(&path).unwrap().is_none());

        fs::write(&path, "").unwrap();
        assert!(modified_time(&path).unwrap().is_some());
    }
}
