//! Transaction state, query execution, index maintenance, and recovery
//! orchestration: the one piece of the storage substrate with no surviving
//! teacher crate to generalize (`database`/`executor`/`planner` were dropped
//! entirely -- see DESIGN.md). Grounded directly in SPEC_FULL.md §4.6 and
//! `original_source/src/database.c`'s `db_execute` dispatch shape.

pub mod request;

use std::fs;

use buffer::BufferPool;
use catalog::{Catalog, TableSchema};
use common::{Config, DbError, DbResult, PageId, RecordBatch};
use request::{CompareOp, Predicate, Statement};
use storage::PageType;
use wal::Wal;

/// The outcome of executing one statement. Mirrors the three-shape result
/// convention `wcygan-sql-database/crates/database/src/lib.rs`'s `QueryResult`
/// uses, renamed to avoid implying SQL-planner provenance -- this engine has no
/// planner, just a fixed index-vs-scan rule (§4.6).
#[derive(Clone, Debug, PartialEq)]
pub enum ExecResult {
    Rows(RecordBatch),
    Count { affected: u64 },
    Empty,
}

/// Owns every durable resource for one database: the paged file (via the buffer
/// pool), the write-ahead log, and the catalog. Mutating access always goes
/// through [`Engine::execute`]; there is no way to reach the pool or catalog
/// directly from outside the crate, matching the ownership rule in SPEC_FULL.md §3.
pub struct Engine {
    config: Config,
    pool: BufferPool,
    wal: Wal,
    catalog: Catalog,
    current_tx_id: u32,
    locked: bool,
}

/// On a brand new file, claim page 0 (the initial, otherwise-unused root tree) and
/// page 1 (the catalog) through the pager's own allocation counter, so that the
/// first `CREATE TABLE`/`CREATE INDEX` afterward is never handed one of these
/// reserved ids (SPEC_FULL.md §6, §8 "Reopening with an empty file creates page 0
/// (empty leaf) and page 1 (empty catalog)"). A no-op on an already-initialized
/// file, since `next_page_id` is then already past both reserved ids.
fn reserve_system_pages(pool: &mut BufferPool) -> DbResult<()> {
    if pool.next_page_id() != 0 {
        return Ok(());
    }

    let (root, _) = pool.allocate_page(PageType::Leaf)?;
    pool.unpin(root, true)?;
    let (catalog_page, _) = pool.allocate_page(PageType::Metadata)?;
    pool.unpin(catalog_page, true)?;
    debug_assert_eq!(root, PageId::ROOT);
    debug_assert_eq!(catalog_page, PageId::CATALOG);
    pool.flush_all()
}

impl Engine {
    /// Open (creating if missing) the database described by `config`. Runs
    /// REDO recovery against every table already in the catalog, and resumes
    /// `current_tx_id` above every id this WAL file has ever seen so a restarted
    /// process can never reissue a transaction id another run used.
    pub fn open(config: Config) -> DbResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = config.wal_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut pool = BufferPool::open(&config.db_path, config.buffer_pool_frames)?;
        reserve_system_pages(&mut pool)?;
        let wal = Wal::open(&config.wal_path)?;
        let catalog = Catalog::load(&mut pool)?;

        let mut engine = Self {
            config,
            pool,
            wal,
            catalog,
            current_tx_id: 0,
            locked: false,
        };
        engine.recover()?;
        Ok(engine)
    }

    fn recover(&mut self) -> DbResult<()> {
        self.current_tx_id = self.wal.max_tx_id()?;
        let roots: Vec<_> = self
            .catalog
            .tables()
            .map(|t| (t.name.clone(), t.root_page_id))
            .collect();
        for (name, root) in roots {
            tracing::info!(table = %name, "replaying committed WAL records");
            self.wal.recover(&mut self.pool, root)?;
        }
        Ok(())
    }

    /// Classify `text` and execute it.
    pub fn execute(&mut self, text: &str) -> DbResult<ExecResult> {
        let statement = request::classify(text)?;
        self.dispatch(statement)
    }

    fn dispatch(&mut self, statement: Statement) -> DbResult<ExecResult> {
        match statement {
            Statement::Begin => self.begin(),
            Statement::Commit => self.commit(),
            Statement::Rollback => self.rollback(),
            Statement::CreateTable { name, columns } => self.create_table(&name, columns),
            Statement::CreateIndex {
                name,
                table,
                column,
                unique,
            } => self.create_index(&name, &table, &column, unique),
            Statement::DropIndex { name, table } => self.drop_index(&name, &table),
            Statement::Insert { table, values } => self.insert(&table, values),
            Statement::Update {
                table,
                column,
                value,
                pk,
            } => self.update(&table, &column, &value, pk),
            Statement::Delete { table, pk } => self.delete(&table, pk),
            Statement::Select { table, predicate } => self.select(&table, predicate),
        }
    }

    fn require_unlocked(&self) -> DbResult<()> {
        if self.locked {
            Err(DbError::Usage(
                "a transaction is already in progress".into(),
            ))
        } else {
            Ok(())
        }
    }

    fn require_locked(&self) -> DbResult<()> {
        if self.locked {
            Ok(())
        } else {
            Err(DbError::Usage("no transaction is in progress".into()))
        }
    }

    fn begin(&mut self) -> DbResult<ExecResult> {
        self.require_unlocked()?;
        self.locked = true;
        self.current_tx_id += 1;
        self.wal.log_begin(self.current_tx_id)?;
        tracing::debug!(tx_id = self.current_tx_id, "BEGIN");
        Ok(ExecResult::Empty)
    }

    fn commit(&mut self) -> DbResult<ExecResult> {
        self.require_locked()?;
        self.wal.log_commit(self.current_tx_id)?;
        self.pool.flush_all()?;
        tracing::debug!(tx_id = self.current_tx_id, "COMMIT");
        self.locked = false;
        Ok(ExecResult::Empty)
    }

    /// Reset to committed state by REDO replay of every previously committed
    /// transaction except the one being rolled back (SPEC_FULL.md §4.6).
    fn rollback(&mut self) -> DbResult<ExecResult> {
        self.require_locked()?;
        let rolled_back_tx = self.current_tx_id;

        self.pool.reopen(&self.config.db_path)?;
        self.catalog = Catalog::load(&mut self.pool)?;
        let roots: Vec<_> = self
            .catalog
            .tables()
            .map(|t| (t.name.clone(), t.root_page_id))
            .collect();
        for (name, root) in roots {
            self.wal
                .apply_committed_transactions(&mut self.pool, root, rolled_back_tx)?;
            tracing::debug!(table = %name, "replayed committed transactions during ROLLBACK");
        }

        self.locked = false;
        Ok(ExecResult::Empty)
    }

    fn create_table(&mut self, name: &str, columns: Vec<catalog::ColumnSchema>) -> DbResult<ExecResult> {
        self.require_unlocked()?;
        self.catalog.create_table(&mut self.pool, name, columns)?;
        tracing::info!(table = name, "CREATE TABLE");
        Ok(ExecResult::Empty)
    }

    fn create_index(
        &mut self,
        name: &str,
        table: &str,
        column: &str,
        unique: bool,
    ) -> DbResult<ExecResult> {
        self.require_unlocked()?;
        self.catalog
            .create_index(&mut self.pool, name, table, column, unique)?;
        tracing::info!(index = name, table, "CREATE INDEX");
        Ok(ExecResult::Empty)
    }

    fn drop_index(&mut self, name: &str, table: &str) -> DbResult<ExecResult> {
        self.require_unlocked()?;
        self.catalog.drop_index(&mut self.pool, table, name)?;
        tracing::info!(index = name, table, "DROP INDEX");
        Ok(ExecResult::Empty)
    }

    fn insert(&mut self, table_name: &str, raw_values: Vec<String>) -> DbResult<ExecResult> {
        self.require_locked()?;
        let table = self.catalog.table(table_name)?.clone();

        let values: Vec<String> = raw_values
            .iter()
            .map(|v| common::row::trim_literal(v).to_string())
            .collect();
        let pk = values
            .first()
            .and_then(|v| v.parse::<i32>().ok())
            .ok_or_else(|| DbError::Usage("the first column's value must be an integer primary key".into()))?;
        let serialized = common::row::encode(&values)?;

        self.wal.log_insert(self.current_tx_id, pk, &serialized)?;
        let inserted = btree::insert(&mut self.pool, table.root_page_id, pk, &serialized)?;
        if !inserted {
            tracing::warn!(table = table_name, pk, "insert dropped: leaf at capacity");
            return Ok(ExecResult::Count { affected: 0 });
        }
        maintain_indexes_insert(&table, &mut self.pool, pk, &serialized)?;
        Ok(ExecResult::Count { affected: 1 })
    }

    fn update(
        &mut self,
        table_name: &str,
        column: &str,
        new_value: &str,
        pk: i32,
    ) -> DbResult<ExecResult> {
        self.require_locked()?;
        let table = self.catalog.table(table_name)?.clone();

        let Some(old_row) = btree::search(&mut self.pool, table.root_page_id, pk)? else {
            return Ok(ExecResult::Count { affected: 0 });
        };
        let ordinal = table
            .column_index(column)
            .ok_or_else(|| DbError::Usage(format!("unknown column '{column}' on table '{table_name}'")))?;
        let trimmed = common::row::trim_literal(new_value);
        let new_row = common::row::with_column_replaced(&old_row, ordinal, trimmed)?;

        maintain_indexes_delete(&table, &mut self.pool, &old_row)?;
        self.wal.log_update(self.current_tx_id, pk, &new_row)?;
        btree::insert(&mut self.pool, table.root_page_id, pk, &new_row)?;
        maintain_indexes_insert(&table, &mut self.pool, pk, &new_row)?;
        Ok(ExecResult::Count { affected: 1 })
    }

    fn delete(&mut self, table_name: &str, pk: i32) -> DbResult<ExecResult> {
        self.require_locked()?;
        let table = self.catalog.table(table_name)?.clone();

        let Some(old_row) = btree::search(&mut self.pool, table.root_page_id, pk)? else {
            return Ok(ExecResult::Count { affected: 0 });
        };
        maintain_indexes_delete(&table, &mut self.pool, &old_row)?;
        self.wal.log_delete(self.current_tx_id, pk)?;
        btree::delete(&mut self.pool, table.root_page_id, pk)?;
        Ok(ExecResult::Count { affected: 1 })
    }

    /// `flush_all` + `invalidate_all` before every SELECT defeats any staleness
    /// from a resident but not-yet-flushed frame (SPEC_FULL.md §4.6).
    fn select(&mut self, table_name: &str, predicate: Option<Predicate>) -> DbResult<ExecResult> {
        let table = self.catalog.table(table_name)?.clone();
        self.pool.flush_all()?;
        self.pool.invalidate_all();

        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();

        if let Some(predicate) = &predicate {
            if predicate.op == CompareOp::Eq {
                if let Some(index) = table.index_on_column(&predicate.column) {
                    let index_root = index.root_page_id;
                    // `atoi`-style parse: a malformed literal searches for key 0
                    // rather than erroring, matching the source this distills from.
                    let key = predicate.value.parse::<i32>().unwrap_or(0);
                    let rows = match btree::search(&mut self.pool, index_root, key)? {
                        Some(pk_str) => {
                            let pk: i32 = pk_str.parse().map_err(|_| {
                                DbError::Storage(format!("index entry '{pk_str}' is not a valid primary key"))
                            })?;
                            match btree::search(&mut self.pool, table.root_page_id, pk)? {
                                Some(row) => vec![common::row::decode(&row)],
                                None => Vec::new(),
                            }
                        }
                        None => Vec::new(),
                    };
                    return Ok(ExecResult::Rows(RecordBatch { columns, rows }));
                }
            }
        }

        let mut rows = Vec::new();
        for (_, raw_row) in btree::scan(&mut self.pool, table.root_page_id)? {
            let decoded = common::row::decode(&raw_row);
            let matches = match &predicate {
                Some(p) => evaluate_predicate(&table, &decoded, p)?,
                None => true,
            };
            if matches {
                rows.push(decoded);
            }
        }
        Ok(ExecResult::Rows(RecordBatch { columns, rows }))
    }
}

/// For every index on `table`, parse the indexed column as `INT` and insert
/// `(value, decimal_ascii(pk))`, skipping indexes whose column doesn't parse as
/// an integer for this row (only `INT`-typed columns are indexable, §4.5).
fn maintain_indexes_insert(
    table: &TableSchema,
    pool: &mut BufferPool,
    pk: i32,
    row: &str,
) -> DbResult<()> {
    let decoded = common::row::decode(row);
    for index in &table.indexes {
        let Some(ordinal) = table.column_index(&index.column_name) else {
            continue;
        };
        if let Some(value) = decoded.get(ordinal).and_then(|v| v.parse::<i32>().ok()) {
            btree::insert(pool, index.root_page_id, value, &pk.to_string())?;
        }
    }
    Ok(())
}

/// Inverse of [`maintain_indexes_insert`]: remove `row`'s entry from every index
/// whose column parses as an integer. Indexes are keyed by column value, not by
/// primary key, so there is nothing pk-specific to do here.
fn maintain_indexes_delete(table: &TableSchema, pool: &mut BufferPool, row: &str) -> DbResult<()> {
    let decoded = common::row::decode(row);
    for index in &table.indexes {
        let Some(ordinal) = table.column_index(&index.column_name) else {
            continue;
        };
        if let Some(value) = decoded.get(ordinal).and_then(|v| v.parse::<i32>().ok()) {
            btree::delete(pool, index.root_page_id, value)?;
        }
    }
    Ok(())
}

/// Evaluate a WHERE predicate against one decoded row. Numeric comparison is via
/// floating-point parse on both sides; when either side fails to parse, only
/// `=`/`!=` fall back to a byte-compare (SPEC_FULL.md §4.6) -- a relational
/// operator against a non-numeric column has no defined meaning here and never
/// matches.
fn evaluate_predicate(table: &TableSchema, row: &[String], predicate: &Predicate) -> DbResult<bool> {
    let ordinal = table.column_index(&predicate.column).ok_or_else(|| {
        DbError::Usage(format!(
            "unknown column '{}' on table '{}'",
            predicate.column, table.name
        ))
    })?;
    let raw = row
        .get(ordinal)
        .ok_or_else(|| DbError::Storage("row has fewer columns than its schema".into()))?;

    match (raw.parse::<f64>(), predicate.value.parse::<f64>()) {
        (Ok(lhs), Ok(rhs)) => Ok(match predicate.op {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }),
        _ => Ok(match predicate.op {
            CompareOp::Eq => raw == &predicate.value,
            CompareOp::Ne => raw != &predicate.value,
            _ => false,
        }),
    }
}
