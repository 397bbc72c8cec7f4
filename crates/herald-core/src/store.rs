//! Abstract relational store.
//!
//! Herald only ever needs three store operations: idempotently create a
//! table, read one row by key, and write (upsert) one row. Rows are JSON
//! objects keyed by column name; [`TableSchema`] names the key columns that
//! identify a row, so a write with an existing key overwrites rather than
//! appends.
//!
//! The connection and transport plumbing of a real database is left to
//! implementors of [`Store`]. [`MemoryStore`] is a process-local
//! implementation that also counts its accesses.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{StoreError, StoreResult};

/// A single row: column name to value.
pub type Row = Map<String, Value>;

/// Shared handle to a store.
pub type BoxedStore = Arc<dyn Store>;

// =============================================================================
// Schema
// =============================================================================

/// SQL-level column types used by Herald tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Short text, `VARCHAR(255)`.
    Text,
    /// 64-bit platform id, `BIGINT`.
    BigInt,
    /// Boolean flag.
    Boolean,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            Self::Text => "VARCHAR(255)",
            Self::BigInt => "BIGINT",
            Self::Boolean => "BOOLEAN",
        }
    }
}

/// A table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Column type.
    pub ty: ColumnType,
}

impl Column {
    /// Creates a column definition.
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

/// Static description of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: &'static str,
    /// All columns, in declaration order.
    pub columns: &'static [Column],
    /// Names of the columns identifying a row.
    pub key: &'static [&'static str],
}

impl TableSchema {
    /// Renders the idempotent `CREATE TABLE IF NOT EXISTS` statement.
    pub fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.ty.sql()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {}({columns})", self.name)
    }

    /// Projects `row` onto the key columns.
    ///
    /// Fails if any key column is missing.
    pub fn key_of(&self, row: &Row) -> StoreResult<Row> {
        let mut key = Row::new();
        for column in self.key {
            let value = row.get(*column).ok_or_else(|| {
                StoreError::schema(self.name, format!("row is missing key column '{column}'"))
            })?;
            key.insert((*column).to_string(), value.clone());
        }
        Ok(key)
    }

    /// Checks that `row` only uses declared columns.
    pub fn check_columns(&self, row: &Row) -> StoreResult<()> {
        match row
            .keys()
            .find(|name| !self.columns.iter().any(|c| c.name == *name))
        {
            Some(unknown) => Err(StoreError::schema(
                self.name,
                format!("unknown column '{unknown}'"),
            )),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Store trait
// =============================================================================

/// The request/response interface to a relational store.
///
/// Implementations must make [`write_row`](Store::write_row) an idempotent
/// overwrite keyed by [`TableSchema::key`]: concurrent first accesses may
/// write the same row more than once.
#[async_trait]
pub trait Store: Send + Sync {
    /// Creates the table if it does not exist yet.
    async fn create_table(&self, schema: &TableSchema) -> StoreResult<()>;

    /// Reads the row whose key columns equal `key`.
    async fn read_row(&self, schema: &TableSchema, key: &Row) -> StoreResult<Option<Row>>;

    /// Inserts `row`, replacing any row with the same key.
    async fn write_row(&self, schema: &TableSchema, row: Row) -> StoreResult<()>;
}

// =============================================================================
// MemoryStore
// =============================================================================

/// A process-local [`Store`] holding rows in hash maps.
///
/// Every `read_row` and `write_row` call is counted, which makes the store
/// handy for asserting caching behaviour.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<&'static str, HashMap<String, Row>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `read_row` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write_row` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Resets both access counters.
    pub fn reset_stats(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Whether the named table exists.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// Returns a copy of all rows in `table`.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn row_id(key: &Row) -> String {
        // `key_of` inserts columns in schema order, so equal keys render identically.
        Value::Object(key.clone()).to_string()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
        trace!(statement = %schema.create_statement(), "Creating table");
        self.tables.write().entry(schema.name).or_default();
        Ok(())
    }

    async fn read_row(&self, schema: &TableSchema, key: &Row) -> StoreResult<Option<Row>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let key = schema.key_of(key)?;
        let tables = self.tables.read();
        let rows = tables
            .get(schema.name)
            .ok_or_else(|| StoreError::read(schema.name, "table does not exist"))?;
        Ok(rows.get(&Self::row_id(&key)).cloned())
    }

    async fn write_row(&self, schema: &TableSchema, row: Row) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        schema.check_columns(&row)?;
        let key = schema.key_of(&row)?;
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(schema.name)
            .ok_or_else(|| StoreError::write(schema.name, "table does not exist"))?;
        rows.insert(Self::row_id(&key), row);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("tables", &self.tables.read().len())
            .field("reads", &self.reads())
            .field("writes", &self.writes())
            .finish()
    }
}
