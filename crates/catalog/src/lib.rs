//! Durable table and secondary-index metadata, persisted whole on the reserved
//! catalog page ([`common::PageId::CATALOG`]).
//!
//! `CREATE TABLE` allocates a root page for the table's B+Tree and appends a
//! [`TableSchema`]; `CREATE INDEX` allocates a root page for the index's B+Tree and
//! backfills it by walking the base table's leaf chain. Both flush the catalog page
//! before returning, matching the write-schema-then-flush ordering the design calls
//! for. There is no free-list: `DROP INDEX` removes the schema entry but leaks the
//! index's pages.

use bincode::config::{self, Config as BincodeConfig};
use bincode::serde::{decode_from_slice, encode_into_slice};
use buffer::BufferPool;
use common::{DbError, DbResult, PageId};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use storage::PageType;
use types::SqlType;

/// Maximum number of tables a single catalog page can describe.
pub const MAX_TABLES: usize = 16;
/// Maximum number of columns in a single table.
pub const MAX_COLUMNS_PER_TABLE: usize = 16;
/// Maximum number of secondary indexes on a single table.
pub const MAX_INDEXES_PER_TABLE: usize = 8;
/// Maximum byte length of a table, column, or index name.
pub const MAX_NAME_LEN: usize = 64;

type Map<K, V> = HashMap<K, V, ahash::RandomState>;

fn bincode_config() -> impl BincodeConfig {
    config::legacy()
}

fn check_name(kind: &str, name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::Usage(format!("{kind} name must not be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(DbError::Usage(format!(
            "{kind} name '{name}' exceeds the {MAX_NAME_LEN}-byte limit"
        )));
    }
    Ok(())
}

/// A single column's declared type and whether it is (part of) the primary key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub ty: SqlType,
    pub is_primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, ty: SqlType, is_primary_key: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            is_primary_key,
        }
    }
}

/// Metadata for a secondary index. Only `INT`-typed columns are indexable in this
/// design (§4.5): `CREATE INDEX` parses the indexed column as `INT` while backfilling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub table_name: String,
    pub column_name: String,
    pub root_page_id: PageId,
    pub is_unique: bool,
    pub is_primary: bool,
}

/// A table's durable schema: name, B+Tree root page, columns, and secondary indexes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub root_page_id: PageId,
    pub columns: Vec<ColumnSchema>,
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    /// Ordinal position of `name` among the table's columns, or `None`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// The first index (if any) whose indexed column is `column`, used by the
    /// dispatcher's "use an equality index if one matches the predicate column" rule.
    pub fn index_on_column(&self, column: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.column_name == column)
    }

    pub fn primary_key_column(&self) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.is_primary_key)
    }
}

/// The whole-catalog record persisted on page 1. Bincode-encoded directly into the
/// page body, the same pattern `btree::page` uses for B+Tree nodes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub tables: Vec<TableSchema>,
    #[serde(skip)]
    name_index: Map<String, usize>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the catalog from page 1. A page that decodes to zero tables (including
    /// one that was never written, since `Pager::read_page` pads unwritten pages
    /// with zeros) is treated as a fresh, empty catalog rather than an error.
    pub fn load(pool: &mut BufferPool) -> DbResult<Self> {
        let idx = pool.get(PageId::CATALOG)?;
        let decoded: DbResult<(Catalog, usize)> = decode_from_slice(pool.page(idx).body(), bincode_config())
            .map_err(|e| DbError::Storage(format!("failed to decode catalog: {e}")));
        pool.unpin(PageId::CATALOG, false)?;
        let mut catalog = match decoded {
            Ok((catalog, _)) => catalog,
            Err(_) => Catalog::empty(),
        };
        catalog.rebuild_index();
        Ok(catalog)
    }

    /// Encode and write the catalog back to page 1. DDL is not WAL-logged, so this
    /// flushes the catalog page immediately rather than leaving it to the buffer
    /// pool's delayed-write policy -- schema changes must be durable by the time
    /// `CREATE TABLE`/`CREATE INDEX`/`DROP INDEX` return.
    pub fn save(&self, pool: &mut BufferPool) -> DbResult<()> {
        let idx = pool.get(PageId::CATALOG)?;
        pool.page_mut(idx).write_header(&storage::PageHeader::new(PageType::Metadata))?;
        let written = encode_into_slice(self, pool.page_mut(idx).body_mut(), bincode_config())
            .map_err(|e| DbError::Storage(format!("failed to encode catalog: {e}")))?;
        if written > pool.page(idx).body().len() {
            return Err(DbError::Storage("catalog overflowed its page".into()));
        }
        pool.unpin(PageId::CATALOG, true)?;
        pool.flush(PageId::CATALOG)
    }

    fn rebuild_index(&mut self) {
        self.name_index.clear();
        for (i, table) in self.tables.iter().enumerate() {
            self.name_index.insert(table.name.clone(), i);
        }
    }

    pub fn table(&self, name: &str) -> DbResult<&TableSchema> {
        let idx = self
            .name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Usage(format!("unknown table '{name}'")))?;
        Ok(&self.tables[idx])
    }

    pub fn table_mut(&mut self, name: &str) -> DbResult<&mut TableSchema> {
        let idx = self
            .name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Usage(format!("unknown table '{name}'")))?;
        Ok(&mut self.tables[idx])
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    /// `CREATE TABLE`: allocate a fresh root page (an empty leaf), append the
    /// schema, and flush the catalog page.
    pub fn create_table(
        &mut self,
        pool: &mut BufferPool,
        name: &str,
        columns: Vec<ColumnSchema>,
    ) -> DbResult<PageId> {
        check_name("table", name)?;
        if self.has_table(name) {
            return Err(DbError::Usage(format!("table '{name}' already exists")));
        }
        if self.tables.len() >= MAX_TABLES {
            return Err(DbError::Usage(format!(
                "catalog already holds the maximum of {MAX_TABLES} tables"
            )));
        }
        if columns.is_empty() {
            return Err(DbError::Usage("table must have at least one column".into()));
        }
        if columns.len() > MAX_COLUMNS_PER_TABLE {
            return Err(DbError::Usage(format!(
                "table '{name}' declares {} columns, exceeding the {MAX_COLUMNS_PER_TABLE}-column limit",
                columns.len()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            check_name("column", &column.name)?;
            if !seen.insert(column.name.clone()) {
                return Err(DbError::Usage(format!(
                    "duplicate column '{}' in table '{name}'",
                    column.name
                )));
            }
        }

        let root_page_id = btree::create_empty_leaf(pool)?;
        self.tables.push(TableSchema {
            name: name.to_string(),
            root_page_id,
            columns,
            indexes: Vec::new(),
        });
        self.rebuild_index();
        self.save(pool)?;
        // DDL is not WAL-logged, so the new root page must be durable on return, not
        // merely dirty in the buffer pool (`Pager::open` recomputes `next_page_id`
        // from file length, so a page allocated but never flushed would be silently
        // reissued to the next allocation after a reopen).
        pool.flush_all()?;
        Ok(root_page_id)
    }

    /// `CREATE [UNIQUE] INDEX name ON table(column)`: validate, allocate the
    /// index's root page, backfill from the base table's leaf chain, append the
    /// schema, and flush.
    pub fn create_index(
        &mut self,
        pool: &mut BufferPool,
        index_name: &str,
        table_name: &str,
        column_name: &str,
        is_unique: bool,
    ) -> DbResult<PageId> {
        check_name("index", index_name)?;
        let table = self.table(table_name)?;
        if table.column_index(column_name).is_none() {
            return Err(DbError::Usage(format!(
                "unknown column '{column_name}' on table '{table_name}'"
            )));
        }
        if table.index(index_name).is_some() {
            return Err(DbError::Usage(format!(
                "index '{index_name}' already exists on table '{table_name}'"
            )));
        }
        if table.indexes.len() >= MAX_INDEXES_PER_TABLE {
            return Err(DbError::Usage(format!(
                "table '{table_name}' already has the maximum of {MAX_INDEXES_PER_TABLE} indexes"
            )));
        }
        let table_root = table.root_page_id;
        let column_ordinal = table.column_index(column_name).unwrap();

        let index_root = btree::create_empty_leaf(pool)?;
        for (pk, row) in btree::scan(pool, table_root)? {
            let columns: Vec<&str> = row.split(common::row::DELIMITER).collect();
            if let Some(raw) = columns.get(column_ordinal) {
                if let Ok(value) = raw.parse::<i32>() {
                    btree::insert(pool, index_root, value, &pk.to_string())?;
                }
            }
        }

        let table = self.table_mut(table_name)?;
        table.indexes.push(IndexSchema {
            name: index_name.to_string(),
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            root_page_id: index_root,
            is_unique,
            is_primary: false,
        });
        self.save(pool)?;
        pool.flush_all()?;
        Ok(index_root)
    }

    /// `DROP INDEX name ON table`: remove the schema entry. The index's pages are
    /// not reclaimed -- this design has no free-list.
    pub fn drop_index(
        &mut self,
        pool: &mut BufferPool,
        table_name: &str,
        index_name: &str,
    ) -> DbResult<()> {
        let table = self.table_mut(table_name)?;
        let pos = table
            .indexes
            .iter()
            .position(|i| i.name == index_name)
            .ok_or_else(|| {
                DbError::Usage(format!(
                    "index '{index_name}' does not exist on table '{table_name}'"
                ))
            })?;
        table.indexes.remove(pos);
        self.save(pool)
    }
}
