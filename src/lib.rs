//! tally - local-first issue tracking for teams
//!
//! This crate provides the core functionality for the `tally` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Issue, IssueStatus, IssueFilter)
//! - [`storage`] - SQLite database layer and schema migrations
//! - [`sync`] - JSONL import and the freshness guard
//! - [`rpc`] - Daemon protocol and client
//! - [`query`] - Transport selection between daemon and direct reads
//! - [`team`] - Per-owner aggregation and rendering
//! - [`config`] - Path discovery and defaults
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod rpc;
pub mod storage;
pub mod sync;
pub mod team;

pub use error::{Error, Result};
