//! Command implementations.

pub mod completions;
pub mod init;
pub mod migrate;
pub mod sync;
pub mod team;
pub mod version;

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{jsonl_path_for, resolve_db_path, resolve_socket_path, rpc_timeout};
use crate::error::{Error, Result};
use crate::query::AppContext;
use crate::rpc::DaemonClient;

/// Resolve the database path from `--db`/`TALLY_DB` or discovery.
///
/// # Errors
///
/// Returns `Error::Config` if no home directory can be determined.
pub fn db_path(explicit: Option<&Path>) -> Result<PathBuf> {
    resolve_db_path(explicit).ok_or_else(|| {
        Error::Config("Could not determine a database location; pass --db".to_string())
    })
}

/// Build the query context from global flags.
///
/// The daemon is probed once here; commands never reconnect.
///
/// # Errors
///
/// Returns `Error::Config` if no database location can be determined.
pub fn build_context(cli: &Cli) -> Result<AppContext> {
    let db_path = db_path(cli.db.as_deref())?;
    let jsonl_path = jsonl_path_for(&db_path);

    let daemon = if cli.no_daemon {
        None
    } else {
        let socket = resolve_socket_path(cli.socket.as_deref(), &db_path);
        DaemonClient::try_connect(&socket, rpc_timeout(cli.rpc_timeout_ms))
    };

    Ok(AppContext::direct(db_path, jsonl_path)
        .with_daemon(daemon)
        .with_allow_stale(cli.allow_stale))
}
