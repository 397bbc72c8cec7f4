//! Per-guild command prefixes.
//!
//! Each guild has one configured prefix, stored in the `identifier` table and
//! cached for the process lifetime. A guild seen for the first time gets the
//! process default written as its row. Independently, the override prefix
//! (`<lowercased bot name>.`) is accepted in every guild so commands stay
//! reachable even when a guild's prefix has been set to something unusable.

use serde::{Deserialize, Serialize};
use tracing::debug;

use herald_core::{
    BoxedStore, Column, ColumnType, GuildId, Record, Row, StoreCache, StoreResult, TableSchema,
};

/// A row of the `identifier` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRow {
    /// Guild id.
    pub id: GuildId,
    /// Configured prefix.
    pub i: String,
}

impl Record for IdentifierRow {
    type Key = GuildId;
    type Value = String;

    const SCHEMA: TableSchema = TableSchema {
        name: "identifier",
        columns: &[
            Column::new("id", ColumnType::BigInt),
            Column::new("i", ColumnType::Text),
        ],
        key: &["id"],
    };

    fn key_row(key: &GuildId) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), (*key).into());
        row
    }

    fn from_parts(id: GuildId, i: String) -> Self {
        Self { id, i }
    }

    fn into_value(self) -> String {
        self.i
    }
}

/// Resolves and updates guild prefixes.
#[derive(Debug)]
pub struct PrefixResolver {
    default_prefix: String,
    override_prefix: String,
    cache: StoreCache<IdentifierRow>,
}

impl PrefixResolver {
    /// Creates a resolver for a bot called `bot_name`.
    pub fn new(
        bot_name: &str,
        default_prefix: impl Into<String>,
        store: Option<BoxedStore>,
    ) -> Self {
        Self {
            default_prefix: default_prefix.into(),
            override_prefix: format!("{}.", bot_name.to_lowercase()),
            cache: StoreCache::new(store),
        }
    }

    /// Creates the `identifier` table if a store is configured.
    pub async fn ensure_table(&self) -> StoreResult<()> {
        self.cache.ensure_table().await
    }

    /// The prefix new guilds start with.
    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    /// The prefix accepted in every guild.
    pub fn override_prefix(&self) -> &str {
        &self.override_prefix
    }

    /// Returns the prefix configured for `guild`.
    ///
    /// The first call for a guild reads the store and, if no row exists,
    /// writes the default prefix as that guild's row.
    pub async fn get_prefix(&self, guild: GuildId) -> StoreResult<String> {
        let default = &self.default_prefix;
        self.cache.get_or_seed(&guild, || default.clone()).await
    }

    /// Sets the prefix for `guild`.
    ///
    /// The cache is updated before the store write; if the write fails the
    /// error is returned and the cache keeps the new prefix.
    pub async fn set_prefix(&self, guild: GuildId, prefix: impl Into<String>) -> StoreResult<()> {
        let prefix = prefix.into();
        debug!(guild, prefix = %prefix, "Setting guild prefix");
        self.cache.set(guild, prefix).await
    }

    /// Cached prefix for `guild`, if it has been resolved already.
    pub fn cached(&self, guild: GuildId) -> Option<String> {
        self.cache.cached(&guild)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use herald_core::{MemoryStore, Store, StoreError};

    use super::*;

    async fn resolver() -> (Arc<MemoryStore>, PrefixResolver) {
        let store = Arc::new(MemoryStore::new());
        let resolver = PrefixResolver::new("Herald", "!", Some(store.clone()));
        resolver.ensure_table().await.unwrap();
        (store, resolver)
    }

    #[test]
    fn test_override_prefix_is_lowercased_name() {
        let resolver = PrefixResolver::new("MiKi", "!", None);
        assert_eq!(resolver.override_prefix(), "miki.");
        assert_eq!(resolver.default_prefix(), "!");
    }

    #[tokio::test]
    async fn test_unseen_guild_gets_default_once() {
        let (store, resolver) = resolver().await;

        assert_eq!(resolver.get_prefix(100).await.unwrap(), "!");
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.rows("identifier"),
            vec![herald_core::cache::encode(&IdentifierRow::from_parts(100, "!".into())).unwrap()]
        );

        assert_eq!(resolver.get_prefix(100).await.unwrap(), "!");
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_stored_prefix_is_loaded() {
        let (store, resolver) = resolver().await;
        store
            .write_row(
                &IdentifierRow::SCHEMA,
                herald_core::cache::encode(&IdentifierRow::from_parts(7, "?".into())).unwrap(),
            )
            .await
            .unwrap();
        store.reset_stats();

        assert_eq!(resolver.get_prefix(7).await.unwrap(), "?");
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_set_prefix_updates_cache_and_store() {
        let (store, resolver) = resolver().await;
        resolver.get_prefix(1).await.unwrap();
        resolver.set_prefix(1, "$").await.unwrap();

        assert_eq!(resolver.get_prefix(1).await.unwrap(), "$");
        let fresh = PrefixResolver::new("Herald", "!", Some(store.clone()));
        assert_eq!(fresh.get_prefix(1).await.unwrap(), "$");
    }

    #[tokio::test]
    async fn test_no_store_uses_default() {
        let resolver = PrefixResolver::new("Herald", "!", None);
        assert_eq!(resolver.get_prefix(1).await.unwrap(), "!");
        resolver.set_prefix(1, "%").await.unwrap();
        assert_eq!(resolver.get_prefix(1).await.unwrap(), "%");
        assert_eq!(resolver.get_prefix(2).await.unwrap(), "!");
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl Store for ReadOnlyStore {
        async fn create_table(&self, _schema: &TableSchema) -> StoreResult<()> {
            Ok(())
        }

        async fn read_row(&self, _schema: &TableSchema, _key: &Row) -> StoreResult<Option<Row>> {
            Ok(None)
        }

        async fn write_row(&self, schema: &TableSchema, _row: Row) -> StoreResult<()> {
            Err(StoreError::write(schema.name, "read-only"))
        }
    }

    #[tokio::test]
    async fn test_failed_set_keeps_cache() {
        let resolver = PrefixResolver::new("Herald", "!", Some(Arc::new(ReadOnlyStore)));

        let err = resolver.set_prefix(3, "&").await.unwrap_err();
        assert!(matches!(err, StoreError::Write { table: "identifier", .. }));
        assert_eq!(resolver.cached(3).as_deref(), Some("&"));

        let err = resolver.get_prefix(4).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert!(resolver.cached(4).is_none());
    }
}
