
pub mod pretty;
pub mod row;

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;

/// Logical identifier for a page in the storage layer. File offset of page `p` is
/// `p * PAGE_SIZE`.
/// Examples:
/// - `let root = PageId(0);`
/// - `let catalog = PageId(1);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u64);

impl PageId {
    /// The reserved root-tree page, allocated on a fresh database.
    pub const ROOT: PageId = PageId(0);
    /// The reserved catalog page.
    pub const CATALOG: PageId = PageId(1);
}

/// A rectangular result set: column labels plus rows of already-decoded column text.
/// Rows are stored on disk as `|`-joined text (see [`row`]), so a result row is just
/// the decoded column strings rather than a typed [`types::Value`] vector.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordBatch {
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Canonical error type shared across the storage engine's crates.
///
/// Taxonomy (see the error-handling design): usage errors are rejected outright,
/// capacity errors are a best-effort outcome the caller must check for, storage/IO
/// errors are treated as fatal, and recovery errors report a truncated WAL.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("usage error: {0}")]
    Usage(String),
    #[error("capacity error: {0}")]
    Capacity(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("recovery error: {0}")]
    Recovery(String),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database components.
///
/// Replaces the hard-coded `wal.log`-in-cwd global state with explicit, configurable
/// paths carried on the engine handle.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .db_path(PathBuf::from("./my_db/data.db"))
///     .wal_path(PathBuf::from("./my_db/wal.log"))
///     .buffer_pool_frames(64)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Path to the single paged data file.
    #[builder(default = PathBuf::from("./db_data/data.db"))]
    pub db_path: PathBuf,
    /// Path to the write-ahead log.
    #[builder(default = PathBuf::from("./db_data/wal.log"))]
    pub wal_path: PathBuf,
    /// Number of frames the buffer pool keeps resident.
    #[builder(default = 100)]
    pub buffer_pool_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./db_data/data.db"),
            wal_path: PathBuf::from("./db_data/wal.log"),
            buffer_pool_frames: 100,
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{Config, DbError, DbResult, PageId, RecordBatch};
    pub use types::{SqlType, Value};
}
