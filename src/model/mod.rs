//! Data models for tally.

pub mod issue;

pub use issue::{Issue, IssueFilter, IssueStatus};
