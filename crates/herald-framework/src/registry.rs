//! Canonical event definitions.
//!
//! The [`EventRegistry`] owns every registered event, grouped by
//! [`Category`] and kept in registration order, plus one global alias table.
//!
//! Names and aliases share a single namespace across all categories: a
//! registration fails if its name or any of its aliases is already used as a
//! name or alias anywhere in the registry. Lookups are case-insensitive.
//!
//! ```rust,ignore
//! use herald_framework::registry::EventRegistry;
//! use herald_core::EventInfo;
//!
//! let mut registry = EventRegistry::new();
//! registry.add_command(EventInfo::new("Ping").alias("p"), |_msg, _prefix| async {
//!     Ok(())
//! })?;
//!
//! assert!(registry.command("ping").is_some());
//! assert_eq!(registry.lookup_alias("p"), Some("ping"));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use herald_core::{
    Category, ConfigurationError, ConfigurationResult, Event, EventHandler, EventInfo, Guild,
    HandlerResult, Message,
};
use tokio_util::sync::CancellationToken;

/// Registry of all events known to the dispatcher.
#[derive(Debug, Default)]
pub struct EventRegistry {
    /// Events per category, in registration order.
    events: HashMap<Category, IndexMap<String, Arc<Event>>>,
    /// Canonical name to category, across all categories.
    names: HashMap<String, Category>,
    /// Alias to canonical name.
    aliases: HashMap<String, String>,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Registration ──────────────────────────────────────────────────────

    /// Registers an event under `category`.
    ///
    /// The definition is canonicalised first (lowercase name and aliases,
    /// usage defaulting to the name). Fails if the handler shape does not
    /// fit the category, or if the name or an alias collides with an
    /// existing name or alias.
    pub fn register(
        &mut self,
        category: Category,
        info: EventInfo,
        handler: EventHandler,
    ) -> ConfigurationResult<Arc<Event>> {
        let info = info.canonicalize();
        if info.name.is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        if !category.accepts(&handler) {
            return Err(ConfigurationError::HandlerMismatch {
                name: info.name,
                category,
            });
        }
        self.check_available(&info)?;

        for alias in &info.aliases {
            self.aliases.insert(alias.clone(), info.name.clone());
        }
        self.names.insert(info.name.clone(), category);

        let name = info.name.clone();
        let event = Arc::new(Event::new(category, info, handler));
        self.events
            .entry(category)
            .or_default()
            .insert(name.clone(), Arc::clone(&event));

        debug!(event = %name, category = %category, "Event registered");
        Ok(event)
    }

    fn check_available(&self, info: &EventInfo) -> ConfigurationResult<()> {
        if let Some(existing) = self.names.get(&info.name) {
            return Err(ConfigurationError::DuplicateName {
                name: info.name.clone(),
                existing: *existing,
            });
        }
        if let Some(owner) = self.aliases.get(&info.name) {
            return Err(ConfigurationError::NameTakenByAlias {
                name: info.name.clone(),
                existing: owner.clone(),
            });
        }

        for (i, alias) in info.aliases.iter().enumerate() {
            if *alias == info.name || self.names.contains_key(alias) {
                return Err(ConfigurationError::AliasShadowsName {
                    token: alias.clone(),
                    event: info.name.clone(),
                    existing: alias.clone(),
                });
            }
            let owner = self
                .aliases
                .get(alias)
                .cloned()
                .or_else(|| info.aliases[..i].contains(alias).then(|| info.name.clone()));
            if let Some(existing) = owner {
                return Err(ConfigurationError::DuplicateAlias {
                    alias: alias.clone(),
                    event: info.name.clone(),
                    existing,
                });
            }
        }
        Ok(())
    }

    /// Registers a prefix-triggered command.
    pub fn add_command<F, Fut>(&mut self, info: EventInfo, f: F) -> ConfigurationResult<Arc<Event>>
    where
        F: Fn(Arc<Message>, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(Category::Command, info, EventHandler::command(f))
    }

    /// Registers a reaction to messages mentioning the bot.
    ///
    /// The handler receives an empty prefix.
    pub fn add_mention<F, Fut>(&mut self, info: EventInfo, f: F) -> ConfigurationResult<Arc<Event>>
    where
        F: Fn(Arc<Message>, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(Category::Mention, info, EventHandler::command(f))
    }

    /// Registers a hook run after every executed command.
    pub fn add_command_done<F, Fut>(
        &mut self,
        info: EventInfo,
        f: F,
    ) -> ConfigurationResult<Arc<Event>>
    where
        F: Fn(Arc<Message>, Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(Category::CommandDone, info, EventHandler::command_done(f))
    }

    /// Registers a hook run when the bot joins a guild.
    pub fn add_join<F, Fut>(&mut self, info: EventInfo, f: F) -> ConfigurationResult<Arc<Event>>
    where
        F: Fn(Guild) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(Category::GuildJoin, info, EventHandler::guild(f))
    }

    /// Registers a hook run when the bot leaves a guild.
    pub fn add_leave<F, Fut>(&mut self, info: EventInfo, f: F) -> ConfigurationResult<Arc<Event>>
    where
        F: Fn(Guild) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(Category::GuildLeave, info, EventHandler::guild(f))
    }

    /// Registers a background task.
    pub fn add_continuous<F, Fut>(
        &mut self,
        info: EventInfo,
        f: F,
    ) -> ConfigurationResult<Arc<Event>>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(Category::Continuous, info, EventHandler::continuous(f))
    }

    // ─── Lookup ────────────────────────────────────────────────────────────

    /// Looks up an event by canonical name within one category.
    pub fn lookup(&self, category: Category, name: &str) -> Option<Arc<Event>> {
        self.events
            .get(&category)?
            .get(name.to_lowercase().as_str())
            .cloned()
    }

    /// Looks up a command by canonical name.
    pub fn command(&self, name: &str) -> Option<Arc<Event>> {
        self.lookup(Category::Command, name)
    }

    /// Looks up an event by canonical name in any category.
    pub fn find(&self, name: &str) -> Option<Arc<Event>> {
        let name = name.to_lowercase();
        let category = self.names.get(&name)?;
        self.lookup(*category, &name)
    }

    /// Resolves an alias to its canonical event name.
    pub fn lookup_alias(&self, alias: &str) -> Option<&str> {
        self.aliases
            .get(alias.to_lowercase().as_str())
            .map(String::as_str)
    }

    /// Iterates the events of `category` in registration order.
    pub fn events(&self, category: Category) -> impl Iterator<Item = &Arc<Event>> {
        self.events
            .get(&category)
            .into_iter()
            .flat_map(|events| events.values())
    }

    /// Number of events registered under `category`.
    pub fn count(&self, category: Category) -> usize {
        self.events.get(&category).map_or(0, IndexMap::len)
    }

    /// Total number of registered events.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_: Arc<Message>, _: String) -> HandlerResult {
        Ok(())
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = EventRegistry::new();
        registry.add_command(EventInfo::new("Ping"), noop).unwrap();

        assert!(registry.command("ping").is_some());
        assert!(registry.command("PING").is_some());
        assert_eq!(registry.command("ping").unwrap().name(), "ping");
        assert!(registry.lookup(Category::Mention, "ping").is_none());
    }

    #[test]
    fn test_usage_defaults_to_name() {
        let mut registry = EventRegistry::new();
        let event = registry.add_command(EventInfo::new("Help"), noop).unwrap();
        assert_eq!(event.usage(), ["help".to_string()]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = EventRegistry::new();
        registry.add_command(EventInfo::new("ping"), noop).unwrap();

        let err = registry.add_command(EventInfo::new("PING"), noop).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateName {
                name: "ping".into(),
                existing: Category::Command,
            }
        );

        // Names are unique across categories too.
        let err = registry.add_mention(EventInfo::new("ping"), noop).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateName { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_alias_collisions_rejected() {
        let mut registry = EventRegistry::new();
        registry
            .add_command(EventInfo::new("ping").alias("p"), noop)
            .unwrap();

        let err = registry
            .add_command(EventInfo::new("pong").alias("P"), noop)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateAlias {
                alias: "p".into(),
                event: "pong".into(),
                existing: "ping".into(),
            }
        );

        let err = registry
            .add_command(EventInfo::new("echo").alias("ping"), noop)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::AliasShadowsName { .. }));

        let err = registry.add_command(EventInfo::new("p"), noop).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::NameTakenByAlias {
                name: "p".into(),
                existing: "ping".into(),
            }
        );
        assert_eq!(err.to_string(), "event name 'p' is already an alias of 'ping'");

        let err = registry
            .add_command(EventInfo::new("say").aliases(["s", "s"]), noop)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateAlias { .. }));

        // Failed registrations leave no partial state behind.
        assert!(registry.command("pong").is_none());
        assert!(registry.lookup_alias("s").is_none());
        assert_eq!(registry.lookup_alias("p"), Some("ping"));
    }

    #[test]
    fn test_handler_must_fit_category() {
        let mut registry = EventRegistry::new();
        let err = registry
            .register(
                Category::GuildJoin,
                EventInfo::new("welcome"),
                EventHandler::command(noop),
            )
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::HandlerMismatch { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = EventRegistry::new();
        let err = registry.add_command(EventInfo::new("  "), noop).unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyName);
    }

    #[test]
    fn test_events_keep_registration_order() {
        let mut registry = EventRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .add_command_done(EventInfo::new(name), |_, _| async { Ok(()) })
                .unwrap();
        }
        let order: Vec<_> = registry
            .events(Category::CommandDone)
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(order, ["zeta", "alpha", "mid"]);
        assert_eq!(registry.count(Category::CommandDone), 3);
        assert_eq!(registry.count(Category::Command), 0);
        assert_eq!(
            registry.find("ALPHA").map(|e| e.category()),
            Some(Category::CommandDone)
        );
    }
}
