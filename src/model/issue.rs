//! Issue model for tally.
//!
//! Issues are owned by the storage layer; everything in this crate outside
//! `storage` and `sync` only reads point-in-time snapshots of them.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Issue status values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Blocked,
    Deferred,
    Closed,
}

impl IssueStatus {
    /// Get the string representation for storage and the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Deferred => "deferred",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "deferred" => Ok(Self::Deferred),
            "closed" => Ok(Self::Closed),
            other => Err(Error::InvalidArgument(format!("unknown status '{other}'"))),
        }
    }
}

impl ToSql for IssueStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for IssueStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}

/// An issue record.
///
/// Fields added by later migrations carry serde defaults so payloads from
/// older daemons and older JSONL exports still deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: IssueStatus,
    /// 0 is most urgent, 4 least.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Owner used by the team view; empty means unowned.
    #[serde(default)]
    pub github_username: String,
    #[serde(default)]
    pub team: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// `local` or `remote:<machine>`; empty when never synced.
    #[serde(default)]
    pub sync_source: String,
    /// Unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

const fn default_priority() -> i32 {
    2
}

fn default_issue_type() -> String {
    "task".to_string()
}

impl Issue {
    /// Whether this issue has an owner for the team view.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        !self.github_username.is_empty()
    }
}

/// Storage-level filter shared by both query transports.
///
/// Owner and team filtering happens in the aggregator, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub limit: Option<usize>,
}

impl IssueFilter {
    /// Filter matching every in-progress issue.
    #[must_use]
    pub fn in_progress() -> Self {
        Self {
            status: Some(IssueStatus::InProgress),
            limit: None,
        }
    }
}
