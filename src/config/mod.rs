//! Configuration management.
//!
//! This module provides functions for discovering tally directories and
//! resolving the database, JSONL and daemon socket paths.
//!
//! # Layout
//!
//! A project keeps everything under one `.tally/` directory:
//! - `tally.db` - the SQLite store
//! - `issues.jsonl` - the git-tracked sync file the store is imported from
//! - `daemon.sock` - the daemon's RPC socket, when a daemon is running
//!
//! Outside a project the same layout lives in `~/.tally/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-project directory.
pub const TALLY_DIR: &str = ".tally";
pub const DB_FILE: &str = "tally.db";
pub const JSONL_FILE: &str = "issues.jsonl";
pub const SOCKET_FILE: &str = "daemon.sock";

/// Default bound on each RPC read and write.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 5000;

/// Discover the project-level `.tally/` directory.
///
/// Resolution strategy:
/// 1. Check the **git root** first. If it has `.tally/`, use it, so a
///    stray directory in a subfolder cannot shadow the real project root.
/// 2. Fall back to walking up from CWD (for non-git projects).
#[must_use]
pub fn discover_project_tally_dir() -> Option<PathBuf> {
    if let Some(git_root) = git_toplevel() {
        let candidate = git_root.join(TALLY_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
    }

    std::env::current_dir()
        .ok()
        .and_then(|cwd| find_tally_dir_from(&cwd))
}

/// Walk up from `start` looking for a `.tally/` directory.
#[must_use]
pub fn find_tally_dir_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(TALLY_DIR))
        .find(|candidate| candidate.is_dir())
}

/// Get the git repository root directory.
fn git_toplevel() -> Option<PathBuf> {
    std::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| PathBuf::from(String::from_utf8_lossy(&o.stdout).trim().to_string()))
}

/// Get the global `~/.tally/` directory.
#[must_use]
pub fn global_tally_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(TALLY_DIR))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag, or `TALLY_DB` via clap)
/// 2. Project `.tally/tally.db`
/// 3. Global `~/.tally/tally.db`
///
/// Returns `None` only when no home directory can be determined.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    discover_project_tally_dir()
        .or_else(global_tally_dir)
        .map(|dir| dir.join(DB_FILE))
}

/// The JSONL sync file that lives beside `db_path`.
#[must_use]
pub fn jsonl_path_for(db_path: &Path) -> PathBuf {
    sibling(db_path, JSONL_FILE)
}

/// Resolve the daemon socket: the explicit path, else beside `db_path`.
#[must_use]
pub fn resolve_socket_path(explicit_path: Option<&Path>, db_path: &Path) -> PathBuf {
    explicit_path.map_or_else(|| sibling(db_path, SOCKET_FILE), Path::to_path_buf)
}

/// RPC timeout from milliseconds, where zero falls back to the default.
#[must_use]
pub fn rpc_timeout(ms: u64) -> Duration {
    if ms == 0 {
        Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS)
    } else {
        Duration::from_millis(ms)
    }
}

fn sibling(path: &Path, file: &str) -> PathBuf {
    path.parent()
        .map_or_else(|| PathBuf::from(file), |dir| dir.join(file))
}
