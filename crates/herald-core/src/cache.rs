//! Lazily-populated, write-through keyed cache over a [`Store`].
//!
//! Both the per-guild prefix and the per-(event, channel) enabled flag follow
//! the same pattern:
//!
//! 1. A cache hit returns immediately.
//! 2. A miss reads the store. A stored row is decoded and cached; an absent
//!    row is seeded with the supplied default, written back, and cached.
//! 3. Explicit updates write the cache first, then the store. A failed store
//!    write is reported but the cache is not rolled back.
//!
//! Without a store the cache only remembers explicit updates; misses return
//! the default without caching it.
//!
//! Store writes from one cache are serialised. A miss that found no row only
//! seeds the default if no value for the key has been cached meanwhile, so a
//! default never overwrites an explicit update that raced with the read.
//! Concurrent misses may still both read the store; the first to seed wins
//! and the others adopt its value.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};
use crate::store::{BoxedStore, Row, TableSchema};

/// A typed table row that can back a [`StoreCache`].
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Cache key; maps onto the table's key columns.
    type Key: Eq + Hash + Clone + Debug + Send + Sync;
    /// Cached value; the non-key columns.
    type Value: Clone + Send + Sync;

    /// The backing table.
    const SCHEMA: TableSchema;

    /// Builds the key row used for lookups.
    fn key_row(key: &Self::Key) -> Row;

    /// Assembles a record from its parts.
    fn from_parts(key: Self::Key, value: Self::Value) -> Self;

    /// Drops the key columns.
    fn into_value(self) -> Self::Value;
}

/// Encodes a record as a row.
pub fn encode<R: Record>(record: &R) -> StoreResult<Row> {
    match serde_json::to_value(record) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(StoreError::Decode {
            table: R::SCHEMA.name,
            reason: format!("record serialised to a non-object value: {other}"),
        }),
        Err(e) => Err(StoreError::Decode {
            table: R::SCHEMA.name,
            reason: e.to_string(),
        }),
    }
}

/// Decodes a row into a record.
pub fn decode<R: Record>(row: Row) -> StoreResult<R> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Decode {
        table: R::SCHEMA.name,
        reason: e.to_string(),
    })
}

/// The shared cache-then-store component.
pub struct StoreCache<R: Record> {
    store: Option<BoxedStore>,
    entries: RwLock<HashMap<R::Key, R::Value>>,
    writes: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> StoreCache<R> {
    /// Creates an empty cache, optionally backed by `store`.
    pub fn new(store: Option<BoxedStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            writes: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// Whether a backing store is configured.
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Creates the backing table if a store is configured.
    pub async fn ensure_table(&self) -> StoreResult<()> {
        if let Some(store) = &self.store {
            store.create_table(&R::SCHEMA).await?;
        }
        Ok(())
    }

    /// Returns the cached value without touching the store.
    pub fn cached(&self, key: &R::Key) -> Option<R::Value> {
        self.entries.read().get(key).cloned()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the value for `key`, loading or seeding it on first access.
    pub async fn get_or_seed<F>(&self, key: &R::Key, default: F) -> StoreResult<R::Value>
    where
        F: FnOnce() -> R::Value,
    {
        if let Some(value) = self.cached(key) {
            trace!(table = R::SCHEMA.name, ?key, "Cache hit");
            return Ok(value);
        }

        let Some(store) = &self.store else {
            return Ok(default());
        };

        if let Some(row) = store.read_row(&R::SCHEMA, &R::key_row(key)).await? {
            let loaded = decode::<R>(row)?.into_value();
            return Ok(self
                .entries
                .write()
                .entry(key.clone())
                .or_insert(loaded)
                .clone());
        }

        let _guard = self.writes.lock().await;
        if let Some(value) = self.cached(key) {
            trace!(table = R::SCHEMA.name, ?key, "Entry set while reading, skipping seed");
            return Ok(value);
        }

        let value = default();
        let row = encode(&R::from_parts(key.clone(), value.clone()))?;
        store.write_row(&R::SCHEMA, row).await?;
        self.entries.write().insert(key.clone(), value.clone());
        debug!(table = R::SCHEMA.name, ?key, "Seeded default row");
        Ok(value)
    }

    /// Writes `value` to the cache, then to the store.
    pub async fn set(&self, key: R::Key, value: R::Value) -> StoreResult<()> {
        let _guard = self.writes.lock().await;
        self.entries.write().insert(key.clone(), value.clone());
        if let Some(store) = &self.store {
            let row = encode(&R::from_parts(key, value))?;
            store.write_row(&R::SCHEMA, row).await?;
        }
        Ok(())
    }
}

impl<R: Record> Debug for StoreCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCache")
            .field("table", &R::SCHEMA.name)
            .field("has_store", &self.has_store())
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::store::{Column, ColumnType, MemoryStore, Store};

    #[derive(Serialize, Deserialize)]
    struct Greeting {
        id: u64,
        text: String,
    }

    impl Record for Greeting {
        type Key = u64;
        type Value = String;

        const SCHEMA: TableSchema = TableSchema {
            name: "greeting",
            columns: &[
                Column::new("id", ColumnType::BigInt),
                Column::new("text", ColumnType::Text),
            ],
            key: &["id"],
        };

        fn key_row(key: &u64) -> Row {
            let mut row = Row::new();
            row.insert("id".into(), json!(key));
            row
        }

        fn from_parts(id: u64, text: String) -> Self {
            Self { id, text }
        }

        fn into_value(self) -> String {
            self.text
        }
    }

    /// Reads from the inner store, then parks until `release` is notified.
    struct SlowReads {
        inner: MemoryStore,
        reading: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Store for SlowReads {
        async fn create_table(&self, schema: &TableSchema) -> StoreResult<()> {
            self.inner.create_table(schema).await
        }

        async fn read_row(&self, schema: &TableSchema, key: &Row) -> StoreResult<Option<Row>> {
            let row = self.inner.read_row(schema, key).await?;
            self.reading.notify_one();
            self.release.notified().await;
            Ok(row)
        }

        async fn write_row(&self, schema: &TableSchema, row: Row) -> StoreResult<()> {
            self.inner.write_row(schema, row).await
        }
    }

    async fn backed() -> (Arc<MemoryStore>, StoreCache<Greeting>) {
        let store = Arc::new(MemoryStore::new());
        let cache = StoreCache::<Greeting>::new(Some(store.clone()));
        cache.ensure_table().await.unwrap();
        (store, cache)
    }

    #[tokio::test]
    async fn test_miss_seeds_once_then_hits() {
        let (store, cache) = backed().await;

        let first = cache.get_or_seed(&7, || "hello".into()).await.unwrap();
        assert_eq!(first, "hello");
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);

        let second = cache.get_or_seed(&7, || "other".into()).await.unwrap();
        assert_eq!(second, "hello");
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_stored_value_wins_over_default() {
        let (store, cache) = backed().await;
        store
            .write_row(&Greeting::SCHEMA, encode(&Greeting::from_parts(3, "stored".into())).unwrap())
            .await
            .unwrap();
        store.reset_stats();

        let value = cache.get_or_seed(&3, || "default".into()).await.unwrap();
        assert_eq!(value, "stored");
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_set_writes_through() {
        let (store, cache) = backed().await;
        cache.set(5, "updated".into()).await.unwrap();

        assert_eq!(cache.cached(&5).as_deref(), Some("updated"));
        assert_eq!(store.rows("greeting").len(), 1);
        assert_eq!(
            cache.get_or_seed(&5, || "default".into()).await.unwrap(),
            "updated"
        );
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_without_store_defaults_are_not_cached() {
        let cache = StoreCache::<Greeting>::new(None);
        assert_eq!(cache.get_or_seed(&1, || "a".into()).await.unwrap(), "a");
        assert!(cache.is_empty());

        cache.set(1, "b".into()).await.unwrap();
        assert_eq!(cache.get_or_seed(&1, || "a".into()).await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_undecodable_row_is_reported() {
        let (store, cache) = backed().await;
        let mut row = Greeting::key_row(&9);
        row.insert("text".into(), json!(12));
        store.write_row(&Greeting::SCHEMA, row).await.unwrap();

        let err = cache.get_or_seed(&9, || "x".into()).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { table: "greeting", .. }));
    }

    #[tokio::test]
    async fn test_seed_does_not_overwrite_concurrent_set() {
        let store = Arc::new(SlowReads {
            inner: MemoryStore::new(),
            reading: Notify::new(),
            release: Notify::new(),
        });
        let cache = StoreCache::<Greeting>::new(Some(store.clone()));
        cache.ensure_table().await.unwrap();

        let (seeded, ()) = tokio::join!(cache.get_or_seed(&4, || "default".into()), async {
            store.reading.notified().await;
            cache.set(4, "explicit".into()).await.unwrap();
            store.release.notify_one();
        });

        assert_eq!(seeded.unwrap(), "explicit");
        assert_eq!(cache.cached(&4).as_deref(), Some("explicit"));
        let rows = store.inner.rows("greeting");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["text"], json!("explicit"));
        assert_eq!(store.inner.writes(), 1);
    }
}
