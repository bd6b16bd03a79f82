//! Transport-transparent issue queries.
//!
//! A command asks for issues through [`QueryExecutor`] and never learns
//! whether they came from the daemon or from the local store:
//!
//! - [`RpcExecutor`] sends `list` to a running daemon
//! - [`DirectExecutor`] reads SQLite, after [`FreshnessGuard`] has
//!   confirmed the store matches the JSONL file
//!
//! [`select_transport`] makes that choice once per command.

use std::path::PathBuf;
use tracing::debug;

use crate::error::Result;
use crate::model::{Issue, IssueFilter};
use crate::rpc::{DaemonClient, ListArgs};
use crate::storage::SqliteStorage;
use crate::sync::FreshnessGuard;

/// Which side of the selector a query went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Rpc,
    Direct,
}

impl TransportKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rpc => "rpc",
            Self::Direct => "direct",
        }
    }
}

/// Fetch issues matching a storage filter.
///
/// Implementations return exactly what their backend holds for the filter.
/// Owner and team filtering is left to the caller.
pub trait QueryExecutor {
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn fetch_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>>;

    fn kind(&self) -> TransportKind;
}

/// Queries a running daemon.
#[derive(Debug, Clone)]
pub struct RpcExecutor {
    client: DaemonClient,
}

impl RpcExecutor {
    #[must_use]
    pub const fn new(client: DaemonClient) -> Self {
        Self { client }
    }
}

impl QueryExecutor for RpcExecutor {
    fn fetch_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        self.client.list(&ListArgs::from_filter(filter))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Rpc
    }
}

/// Queries a store it owns; the connection closes when this drops.
pub struct DirectExecutor {
    storage: SqliteStorage,
}

impl DirectExecutor {
    #[must_use]
    pub const fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

impl QueryExecutor for DirectExecutor {
    fn fetch_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        self.storage.search_issues("", filter)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }
}

/// The executor chosen for one command.
pub enum Transport {
    Rpc(RpcExecutor),
    Direct(DirectExecutor),
}

impl QueryExecutor for Transport {
    fn fetch_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        match self {
            Self::Rpc(executor) => executor.fetch_issues(filter),
            Self::Direct(executor) => executor.fetch_issues(filter),
        }
    }

    fn kind(&self) -> TransportKind {
        match self {
            Self::Rpc(_) => TransportKind::Rpc,
            Self::Direct(_) => TransportKind::Direct,
        }
    }
}

/// Everything a command needs to reach issue data.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub db_path: PathBuf,
    pub jsonl_path: PathBuf,
    /// Present only when a daemon answered `ping` at startup.
    pub daemon: Option<DaemonClient>,
    pub allow_stale: bool,
}

impl AppContext {
    /// Context for direct access only.
    #[must_use]
    pub fn direct(db_path: impl Into<PathBuf>, jsonl_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            jsonl_path: jsonl_path.into(),
            daemon: None,
            allow_stale: false,
        }
    }

    #[must_use]
    pub fn with_daemon(mut self, daemon: Option<DaemonClient>) -> Self {
        self.daemon = daemon;
        self
    }

    #[must_use]
    pub const fn with_allow_stale(mut self, allow_stale: bool) -> Self {
        self.allow_stale = allow_stale;
        self
    }
}

/// Pick the transport for this command.
///
/// A daemon client in the context always wins. Otherwise the store is
/// opened and must pass the freshness check before it is used.
///
/// # Errors
///
/// Returns `Error::NotInitialized` if there is no database,
/// `Error::DatabaseStale` if the store lags the JSONL file and stale reads
/// are not allowed, or a database error if it cannot be opened.
pub fn select_transport(ctx: &AppContext) -> Result<Transport> {
    if let Some(client) = &ctx.daemon {
        debug!(socket = %client.socket_path().display(), "Using daemon transport");
        return Ok(Transport::Rpc(RpcExecutor::new(client.clone())));
    }

    let storage = SqliteStorage::open_existing(&ctx.db_path)?;
    FreshnessGuard::new(&ctx.jsonl_path, ctx.allow_stale).check(&storage)?;

    debug!(db = %ctx.db_path.display(), "Using direct transport");
    Ok(Transport::Direct(DirectExecutor::new(storage)))
}
