//! Per-channel enabled flags.
//!
//! Whether an event runs in a channel is stored as one row of the `event`
//! table per (event name, channel id). Guild hooks use the guild id in place
//! of a channel id.

use serde::{Deserialize, Serialize};
use tracing::debug;

use herald_core::{
    BoxedStore, ChannelId, Column, ColumnType, Event, Record, Row, StoreCache, StoreResult,
    TableSchema,
};

use crate::registry::EventRegistry;

/// A row of the `event` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStateRow {
    /// Canonical event name.
    pub name: String,
    /// Channel (or guild) id.
    pub id: ChannelId,
    /// Whether the event is enabled there.
    pub enabled: bool,
}

impl Record for EventStateRow {
    type Key = (String, ChannelId);
    type Value = bool;

    const SCHEMA: TableSchema = TableSchema {
        name: "event",
        columns: &[
            Column::new("name", ColumnType::Text),
            Column::new("id", ColumnType::BigInt),
            Column::new("enabled", ColumnType::Boolean),
        ],
        key: &["name", "id"],
    };

    fn key_row((name, id): &(String, ChannelId)) -> Row {
        let mut row = Row::new();
        row.insert("name".into(), name.clone().into());
        row.insert("id".into(), (*id).into());
        row
    }

    fn from_parts((name, id): (String, ChannelId), enabled: bool) -> Self {
        Self { name, id, enabled }
    }

    fn into_value(self) -> bool {
        self.enabled
    }
}

/// Lazily-loaded enabled state per (event, channel).
#[derive(Debug)]
pub struct EnabledStateCache {
    cache: StoreCache<EventStateRow>,
}

impl EnabledStateCache {
    /// Creates the cache, optionally backed by `store`.
    pub fn new(store: Option<BoxedStore>) -> Self {
        Self {
            cache: StoreCache::new(store),
        }
    }

    /// Creates the `event` table if a store is configured.
    pub async fn ensure_table(&self) -> StoreResult<()> {
        self.cache.ensure_table().await
    }

    /// Whether `event` is enabled in `channel`.
    ///
    /// A known entry wins. Otherwise the store decides, and a missing row is
    /// persisted with the event's default. Without a store the default is
    /// returned and nothing is cached.
    pub async fn is_enabled(&self, event: &Event, channel: ChannelId) -> StoreResult<bool> {
        let default = event.default_enabled();
        self.cache
            .get_or_seed(&(event.name().to_string(), channel), || default)
            .await
    }

    /// Enables or disables the named event in `channel`.
    ///
    /// Returns `Ok(false)` without touching any state if the event is
    /// unknown, or if it is being disabled while `can_be_disabled` is off.
    pub async fn set_enabled(
        &self,
        registry: &EventRegistry,
        event_name: &str,
        channel: ChannelId,
        enabled: bool,
    ) -> StoreResult<bool> {
        let Some(event) = registry.find(event_name) else {
            debug!(event = %event_name, "Cannot toggle unknown event");
            return Ok(false);
        };
        if !enabled && !event.can_be_disabled() {
            debug!(event = %event.name(), "Event cannot be disabled");
            return Ok(false);
        }

        self.cache
            .set((event.name().to_string(), channel), enabled)
            .await?;
        debug!(event = %event.name(), channel, enabled, "Event state updated");
        Ok(true)
    }

    /// Cached state, if known.
    pub fn cached(&self, event_name: &str, channel: ChannelId) -> Option<bool> {
        self.cache
            .cached(&(event_name.to_lowercase(), channel))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use herald_core::{EventInfo, HandlerResult, MemoryStore, Message, Store};

    use super::*;

    async fn noop(_: Arc<Message>, _: String) -> HandlerResult {
        Ok(())
    }

    fn registry() -> EventRegistry {
        let mut registry = EventRegistry::new();
        registry.add_command(EventInfo::new("ping"), noop).unwrap();
        registry
            .add_command(EventInfo::new("quiet").default_enabled(false), noop)
            .unwrap();
        registry
            .add_command(EventInfo::new("help").can_be_disabled(false), noop)
            .unwrap();
        registry
    }

    async fn backed() -> (Arc<MemoryStore>, EnabledStateCache) {
        let store = Arc::new(MemoryStore::new());
        let cache = EnabledStateCache::new(Some(store.clone()));
        cache.ensure_table().await.unwrap();
        (store, cache)
    }

    #[tokio::test]
    async fn test_first_access_reads_once_and_seeds() {
        let (store, cache) = backed().await;
        let registry = registry();
        let ping = registry.command("ping").unwrap();

        assert!(cache.is_enabled(&ping, 10).await.unwrap());
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);

        assert!(cache.is_enabled(&ping, 10).await.unwrap());
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);

        let quiet = registry.command("quiet").unwrap();
        assert!(!cache.is_enabled(&quiet, 10).await.unwrap());
        assert!(!cache.is_enabled(&quiet, 10).await.unwrap());
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn test_stored_state_overrides_default() {
        let (store, cache) = backed().await;
        let registry = registry();
        store
            .write_row(
                &EventStateRow::SCHEMA,
                herald_core::cache::encode(&EventStateRow {
                    name: "ping".into(),
                    id: 4,
                    enabled: false,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let ping = registry.command("ping").unwrap();
        assert!(!cache.is_enabled(&ping, 4).await.unwrap());
        assert!(cache.is_enabled(&ping, 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_enabled_rules() {
        let (store, cache) = backed().await;
        let registry = registry();
        let help = registry.command("help").unwrap();

        assert!(cache.is_enabled(&help, 1).await.unwrap());
        store.reset_stats();

        assert!(!cache.set_enabled(&registry, "help", 1, false).await.unwrap());
        assert!(cache.is_enabled(&help, 1).await.unwrap());
        assert_eq!(store.writes(), 0);

        assert!(cache.set_enabled(&registry, "help", 1, true).await.unwrap());
        assert!(!cache.set_enabled(&registry, "missing", 1, true).await.unwrap());

        assert!(cache.set_enabled(&registry, "PING", 1, false).await.unwrap());
        assert_eq!(cache.cached("ping", 1), Some(false));
        let ping = registry.command("ping").unwrap();
        assert!(!cache.is_enabled(&ping, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_without_store() {
        let cache = EnabledStateCache::new(None);
        let registry = registry();
        let ping = registry.command("ping").unwrap();

        assert!(cache.is_enabled(&ping, 1).await.unwrap());
        assert_eq!(cache.cached("ping", 1), None);

        assert!(cache.set_enabled(&registry, "ping", 1, false).await.unwrap());
        assert!(!cache.is_enabled(&ping, 1).await.unwrap());
        assert!(cache.is_enabled(&ping, 2).await.unwrap());
    }
}
