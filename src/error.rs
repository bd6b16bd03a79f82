//! Error types for the tally CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=stale, 5=transport, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tally operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,
    MigrationFailed,

    // Staleness (exit 3)
    DatabaseStale,

    // Validation (exit 4)
    InvalidArgument,
    InvalidIdentifier,
    InvalidRegistry,

    // Transport (exit 5)
    DaemonError,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::MigrationFailed => "MIGRATION_FAILED",
            Self::DatabaseStale => "DATABASE_STALE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidIdentifier => "INVALID_IDENTIFIER",
            Self::InvalidRegistry => "INVALID_REGISTRY",
            Self::DaemonError => "DAEMON_ERROR",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::DatabaseError
            | Self::MigrationFailed => 2,
            Self::DatabaseStale => 3,
            Self::InvalidArgument | Self::InvalidIdentifier | Self::InvalidRegistry => 4,
            Self::DaemonError => 5,
            Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a caller should retry after corrective action.
    ///
    /// True for invalid input and stale databases (re-import, then retry).
    /// Transport failures are not; the caller falls back to `--no-daemon`.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument | Self::DatabaseStale | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in tally operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `tally init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to {operation}: {source}")]
    Query {
        operation: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A single migration change could not be checked or applied.
    #[error("Migration {version} failed to {action} {target}: {source}")]
    Migration {
        version: u32,
        action: &'static str,
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid migration registry: {0}")]
    InvalidRegistry(String),

    #[error("Database is out of date with {}", jsonl_path.display())]
    DatabaseStale { jsonl_path: PathBuf },

    #[error("Daemon error: {message}")]
    Daemon {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Storage failure tagged with the read that was running.
    pub fn query(operation: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Query {
            operation: operation.into(),
            source,
        }
    }

    /// Transport failure with an underlying I/O cause.
    pub fn daemon_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Daemon {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Transport failure reported by the daemon or caused by a bad payload.
    pub fn daemon(message: impl Into<String>) -> Self {
        Self::Daemon {
            message: message.into(),
            source: None,
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) | Self::Query { .. } => ErrorCode::DatabaseError,
            Self::Migration { .. } => ErrorCode::MigrationFailed,
            Self::InvalidIdentifier(_) => ErrorCode::InvalidIdentifier,
            Self::InvalidRegistry(_) => ErrorCode::InvalidRegistry,
            Self::DatabaseStale { .. } => ErrorCode::DatabaseStale,
            Self::Daemon { .. } => ErrorCode::DaemonError,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `tally init` to create the database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::Migration { version, .. } => Some(format!(
                "Migrations are additive and safe to re-run. Fix the cause and run \
                 `tally migrate` again; it resumes at step {version}."
            )),

            Self::DatabaseStale { jsonl_path } => Some(format!(
                "{} changed since the last import.\n  \
                 Refresh: tally sync import\n  \
                 Or read anyway: tally --allow-stale <command>",
                jsonl_path.display()
            )),

            Self::Daemon { .. } => Some(
                "The daemon could not answer. Retry with `--no-daemon` to read \
                 the local database directly."
                    .to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("status") {
                    Some(
                        "Valid statuses: open, in_progress, blocked, deferred, closed".to_string(),
                    )
                } else if msg.contains("priority") {
                    Some("Valid priorities: 0-4 (0 is most urgent)".to_string())
                } else {
                    None
                }
            }

            Self::Database(_)
            | Self::Query { .. }
            | Self::InvalidIdentifier(_)
            | Self::InvalidRegistry(_)
            | Self::Sync(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_is_distinct_from_storage() {
        let stale = Error::DatabaseStale {
            jsonl_path: PathBuf::from(".tally/issues.jsonl"),
        };
        let storage = Error::Database(rusqlite::Error::QueryReturnedNoRows);

        assert_eq!(stale.error_code(), ErrorCode::DatabaseStale);
        assert_eq!(storage.error_code(), ErrorCode::DatabaseError);
        assert_ne!(stale.exit_code(), storage.exit_code());
        assert!(stale.hint().unwrap().contains("tally sync import"));
    }

    #[test]
    fn test_migration_error_names_target() {
        let err = Error::Migration {
            version: 3,
            action: "add column",
            target: "team".to_string(),
            source: rusqlite::Error::InvalidQuery,
        };
        let msg = err.to_string();
        assert!(msg.contains("team"));
        assert!(msg.contains("add column"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_query_error_keeps_operation() {
        let err = Error::query(
            "search issues (status=in_progress)",
            rusqlite::Error::InvalidQuery,
        );
        assert!(err.to_string().contains("search issues (status=in_progress)"));
        assert_eq!(err.error_code(), ErrorCode::DatabaseError);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_structured_json_shape() {
        let err = Error::daemon("connection reset");
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "DAEMON_ERROR");
        assert_eq!(json["error"]["exit_code"], 5);
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("--no-daemon"));
    }
}
