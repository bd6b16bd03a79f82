//! JSONL sync and freshness.
//!
//! The issues JSONL file is the git-tracked source of truth; the SQLite
//! store is a cache of it.
//!
//! - **Import**: `issues.jsonl` → SQLite, recording the import time and
//!   the file's content hash
//! - **Freshness**: before a direct read, refuse to serve a store whose
//!   JSONL has since changed
//!
//! # Example
//!
//! ```ignore
//! use tally::sync::{FreshnessGuard, Importer};
//!
//! let stats = Importer::new(&mut storage).import(&jsonl_path)?;
//! FreshnessGuard::new(&jsonl_path, false).check(&storage)?;
//! ```

mod file;
mod freshness;
mod hash;
mod import;

pub use file::{modified_time, parse_jsonl};
pub use freshness::{Freshness, FreshnessGuard};
pub use hash::{content_hash, has_changed};
pub use import::{ImportStats, Importer, LOCAL_SYNC_SOURCE};
