//! Write-Ahead Log: an append-only, REDO-only log supporting BEGIN/COMMIT/ROLLBACK.
//!
//! Every mutation is logged before it touches the B+Tree (see `engine`'s dispatch
//! order). Recovery works in two passes: first scan the whole file to compute the
//! set of committed transaction ids, then rescan from the start and replay only the
//! records whose `tx_id` is in that set. This makes replay idempotent regardless of
//! how far a transaction's records made it into the file before a crash.
//!
//! # Durability boundary
//!
//! Records are written and flushed to the OS on every append, but this file is not
//! `fsync`ed per record -- only [`Wal::sync`] forces that. `COMMIT` triggers the
//! buffer pool's `flush_all` on the data file, not a WAL fsync; a crash between the
//! COMMIT record landing in the OS page cache and that cache reaching disk can still
//! lose the commit. Calling `sync()` after `log_commit` closes that window; this
//! design leaves it to the caller (see the spec's durability notes).

#[cfg(test)]
mod tests;

use bincode::config::{self, Config as BincodeConfig};
use bincode::serde::{decode_from_slice, encode_to_vec};
use buffer::BufferPool;
use common::{DbError, DbResult, PageId};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::{File, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
};

fn bincode_config() -> impl BincodeConfig {
    config::legacy()
}

/// A single WAL entry. Carries its own `lsn`/`tx_id` rather than a separate header
/// struct, since bincode already frames the variant discriminant -- this is the
/// idiomatic encoding of `{lsn, type, tx_id, value_len}` plus a type-specific
/// payload the spec describes, not a byte-for-byte struct layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WalRecord {
    Begin { lsn: u64, tx_id: u32 },
    Commit { lsn: u64, tx_id: u32 },
    Insert { lsn: u64, tx_id: u32, key: i32, value: String },
    Update { lsn: u64, tx_id: u32, key: i32, value: String },
    Delete { lsn: u64, tx_id: u32, key: i32 },
}

impl WalRecord {
    pub fn lsn(&self) -> u64 {
        match self {
            WalRecord::Begin { lsn, .. }
            | WalRecord::Commit { lsn, .. }
            | WalRecord::Insert { lsn, .. }
            | WalRecord::Update { lsn, .. }
            | WalRecord::Delete { lsn, .. } => *lsn,
        }
    }

    pub fn tx_id(&self) -> u32 {
        match self {
            WalRecord::Begin { tx_id, .. }
            | WalRecord::Commit { tx_id, .. }
            | WalRecord::Insert { tx_id, .. }
            | WalRecord::Update { tx_id, .. }
            | WalRecord::Delete { tx_id, .. } => *tx_id,
        }
    }

    pub fn is_commit(&self) -> bool {
        matches!(self, WalRecord::Commit { .. })
    }
}

/// Append-only log file plus the next LSN to assign. Opened in append mode, so
/// every `write_all` lands after the current end of file regardless of concurrent
/// readers -- though per the concurrency model, only one process ever touches it.
#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    file: File,
    next_lsn: u64,
}

impl Wal {
    /// Open (creating if missing) the WAL file at `path`. Scans existing records to
    /// resume LSN allocation above the highest one already on disk, stopping at the
    /// first truncated or corrupt record the way recovery does.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .truncate(false)
            .open(&path)?;

        let mut wal = Self {
            path,
            file,
            next_lsn: 1,
        };
        let max_lsn = wal.read_all()?.iter().map(WalRecord::lsn).max();
        if let Some(max) = max_lsn {
            wal.next_lsn = max + 1;
        }
        Ok(wal)
    }

    pub fn log_begin(&mut self, tx_id: u32) -> DbResult<()> {
        self.append(|lsn| WalRecord::Begin { lsn, tx_id })
    }

    pub fn log_commit(&mut self, tx_id: u32) -> DbResult<()> {
        self.append(|lsn| WalRecord::Commit { lsn, tx_id })
    }

    pub fn log_insert(&mut self, tx_id: u32, key: i32, value: &str) -> DbResult<()> {
        self.append(|lsn| WalRecord::Insert {
            lsn,
            tx_id,
            key,
            value: value.to_string(),
        })
    }

    pub fn log_update(&mut self, tx_id: u32, key: i32, value: &str) -> DbResult<()> {
        self.append(|lsn| WalRecord::Update {
            lsn,
            tx_id,
            key,
            value: value.to_string(),
        })
    }

    pub fn log_delete(&mut self, tx_id: u32, key: i32) -> DbResult<()> {
        self.append(|lsn| WalRecord::Delete { lsn, tx_id, key })
    }

    fn append(&mut self, build: impl FnOnce(u64) -> WalRecord) -> DbResult<()> {
        let record = build(self.next_lsn);
        self.next_lsn += 1;

        let bytes = encode_to_vec(&record, bincode_config())
            .map_err(|e| DbError::Storage(format!("failed to serialize WAL record: {e}")))?;
        let len = bytes.len() as u32;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&bytes)?;
        self.file.flush()?;
        Ok(())
    }

    /// Force the WAL file itself to disk. Not called automatically by `log_commit`
    /// -- see the durability-boundary note at module scope.
    pub fn sync(&mut self) -> DbResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Read every well-formed record from the start of the file. Stops (without
    /// erroring) at the first truncated length prefix or payload, per the recovery
    /// error-handling contract: an uncommitted, partially-written tail is discarded.
    fn read_all(&self) -> DbResult<Vec<WalRecord>> {
        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        let mut records = Vec::new();
        loop {
            let mut len_buf = [0u8; 4];
            match file.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(DbError::Io(e)),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut buf = vec![0u8; len];
            if file.read_exact(&mut buf).is_err() {
                break;
            }
            match decode_from_slice::<WalRecord, _>(&buf, bincode_config()) {
                Ok((record, _)) => records.push(record),
                Err(_) => break,
            }
        }
        Ok(records)
    }

    /// The set of `tx_id`s that have a COMMIT record anywhere in the log.
    pub fn committed_tx_ids(&self) -> DbResult<HashSet<u32>> {
        Ok(self
            .read_all()?
            .iter()
            .filter(|r| r.is_commit())
            .map(WalRecord::tx_id)
            .collect())
    }

    /// The highest `tx_id` that appears anywhere in the log, committed or not, or 0
    /// for an empty log. `current_tx_id` is only monotonic per process lifetime
    /// (SPEC_FULL.md §4.6), so a fresh process must resume counting above every id
    /// this WAL file has ever seen -- otherwise a reused id could make a brand new,
    /// uncommitted transaction's records look like they belong to an old committed
    /// one on the next recovery pass.
    pub fn max_tx_id(&self) -> DbResult<u32> {
        Ok(self.read_all()?.iter().map(WalRecord::tx_id).max().unwrap_or(0))
    }

    /// REDO pass: recompute the committed set, then replay every record belonging
    /// to a committed transaction against `table_root_id`, in log order.
    ///
    /// Not table-qualified -- a WAL record from a different table's transaction is
    /// still replayed against `table_root_id` if its key happens to match, since
    /// records do not carry a table identifier (see the design notes on recovery
    /// with multiple tables). Tests must avoid cross-table primary-key collisions.
    pub fn recover(&self, pool: &mut BufferPool, table_root_id: PageId) -> DbResult<()> {
        let committed = self.committed_tx_ids()?;
        self.apply(pool, table_root_id, &committed, None)
    }

    /// Used by ROLLBACK: replay every committed transaction except `excluded_tx`
    /// against a freshly reopened, empty buffer pool, resetting state to "every
    /// commit other than the one being rolled back".
    pub fn apply_committed_transactions(
        &self,
        pool: &mut BufferPool,
        table_root_id: PageId,
        excluded_tx: u32,
    ) -> DbResult<()> {
        let committed = self.committed_tx_ids()?;
        self.apply(pool, table_root_id, &committed, Some(excluded_tx))
    }

    fn apply(
        &self,
        pool: &mut BufferPool,
        table_root_id: PageId,
        committed: &HashSet<u32>,
        excluded_tx: Option<u32>,
    ) -> DbResult<()> {
        for record in self.read_all()? {
            if !committed.contains(&record.tx_id()) {
                continue;
            }
            if excluded_tx == Some(record.tx_id()) {
                continue;
            }
            match record {
                WalRecord::Insert { key, value, .. } => {
                    btree::insert(pool, table_root_id, key, &value)?;
                }
                WalRecord::Update { key, value, .. } => {
                    btree::delete(pool, table_root_id, key)?;
                    btree::insert(pool, table_root_id, key, &value)?;
                }
                WalRecord::Delete { key, .. } => {
                    btree::delete(pool, table_root_id, key)?;
                }
                WalRecord::Begin { .. } | WalRecord::Commit { .. } => {}
            }
        }
        Ok(())
    }
}
