//! Daemon RPC protocol.
//!
//! Newline-delimited JSON over a Unix domain socket. Each connection carries
//! one request line and one response line:
//!
//! ```json
//! {"operation":"list","args":{"status":"in_progress"},"request_id":"…","client_version":"0.4.2"}
//! {"success":true,"data":[{"id":"BD-1",…}]}
//! ```
//!
//! Only the client side lives here; the daemon's server loop is a separate
//! process.

mod client;

pub use client::DaemonClient;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};

use crate::error::{Error, Result};
use crate::model::{IssueFilter, IssueStatus};

/// Operations the daemon understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Ping,
}

/// One request line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub operation: Operation,
    #[serde(default)]
    pub args: Value,
    pub request_id: String,
    pub client_version: String,
}

impl Request {
    /// Build a request with a fresh id, stamped with this client's version.
    #[must_use]
    pub fn new(operation: Operation, args: Value) -> Self {
        Self {
            operation,
            args,
            request_id: uuid::Uuid::new_v4().to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One response line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    #[must_use]
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Unwrap the payload, turning a daemon-side failure into an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Daemon` when `success` is false.
    pub fn into_result(self) -> Result<Value> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(Error::daemon(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }
}

/// Arguments of the `list` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListArgs {
    pub status: IssueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ListArgs {
    /// The only listing the team view needs.
    #[must_use]
    pub const fn in_progress() -> Self {
        Self {
            status: IssueStatus::InProgress,
            query: None,
            limit: None,
        }
    }

    /// Translate a store filter into list arguments.
    ///
    /// A filter without a status lists in-progress issues.
    #[must_use]
    pub fn from_filter(filter: &IssueFilter) -> Self {
        Self {
            status: filter.status.unwrap_or(IssueStatus::InProgress),
            query: None,
            limit: filter.limit,
        }
    }
}

/// Write one message as a single JSON line and flush.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()
}

/// Read one JSON line. Returns `None` at end of stream.
///
/// # Errors
///
/// Returns an error if the read fails or the line is not valid JSON for `T`.
pub fn read_message<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}
