//! SQLite storage layer for tally.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode so a daemon and direct CLI readers can share the file
//! - Transaction discipline for atomic writes
//! - Additive, idempotent schema migrations
//!
//! # Submodules
//!
//! - [`introspect`] - Live schema catalog queries
//! - [`migrations`] - Migration steps, registry and runner
//! - [`schema`] - Base schema definition
//! - [`sqlite`] - Main SQLite storage implementation

pub mod introspect;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use introspect::SchemaIntrospector;
pub use migrations::{
    ColumnSpec, IndexSpec, MigrationRegistry, MigrationReport, MigrationRunner, MigrationStep,
    StepReport,
};
pub use sqlite::SqliteStorage;
