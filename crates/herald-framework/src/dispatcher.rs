//! The message dispatch pipeline.
//!
//! [`Dispatcher`] turns inbound platform events into handler invocations:
//!
//! 1. Messages from bot accounts and from ignored guilds are dropped.
//! 2. The guild prefix is tried, then the override prefix; the first one that
//!    starts the lowercased message wins. Only that prefix is considered.
//! 3. The first whitespace-delimited token after it names the command, by
//!    canonical name first and then through the alias table.
//! 4. The command runs only if it is enabled in the channel and the caller's
//!    tier is at least the command's tier. Otherwise nothing happens.
//! 5. After the handler succeeds, every command-done hook runs in
//!    registration order.
//!
//! ```rust,ignore
//! use herald_framework::{BotInfo, Dispatcher, EventRegistry, InstanceSlot};
//!
//! let mut registry = EventRegistry::new();
//! registry.add_command(EventInfo::new("ping"), |_msg, _prefix| async { Ok(()) })?;
//!
//! let dispatcher = Dispatcher::builder(BotInfo::new("Herald"))
//!     .registry(registry)
//!     .store(Arc::new(MemoryStore::new()))
//!     .build(InstanceSlot::process())
//!     .await?;
//!
//! dispatcher.on_message(Arc::new(message), Guild::new(1)).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, debug_span, info, trace, warn};

use herald_core::{
    Accessibility, BoxedStore, Category, ChannelId, ConfigurationError, Event, EventHandler,
    Guild, GuildId, Message, NoPermissions, PermissionSource, StoreResult, UserId,
};

use crate::accessibility::AccessibilityResolver;
use crate::enabled::EnabledStateCache;
use crate::error::{DispatchError, DispatchResult};
use crate::handle::DispatcherHandle;
use crate::instance::InstanceSlot;
use crate::listing::{self, ModuleListing};
use crate::prefix::PrefixResolver;
use crate::registry::EventRegistry;

// =============================================================================
// BotInfo
// =============================================================================

/// Static facts about the bot the dispatcher serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfo {
    /// Bot name; its lowercase form plus `.` is the override prefix.
    pub name: String,
    /// Prefix for guilds without a stored one.
    pub default_prefix: String,
    /// Users granted the developer tier.
    pub developers: Vec<UserId>,
    /// Guilds whose messages are ignored.
    pub ignored_guilds: Vec<GuildId>,
}

impl BotInfo {
    /// Creates bot info with the default `!` prefix.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_prefix: "!".to_string(),
            developers: Vec::new(),
            ignored_guilds: Vec::new(),
        }
    }

    /// Sets the default prefix.
    pub fn default_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_prefix = prefix.into();
        self
    }

    /// Adds a developer.
    pub fn developer(mut self, user: UserId) -> Self {
        self.developers.push(user);
        self
    }

    /// Adds an ignored guild.
    pub fn ignore_guild(mut self, guild: GuildId) -> Self {
        self.ignored_guilds.push(guild);
        self
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What [`Dispatcher::on_message`] did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Bot author or ignored guild.
    Ignored,
    /// No prefix matched.
    NoPrefix,
    /// A prefix matched but no command is named by the token.
    UnknownCommand,
    /// The command is disabled in the channel.
    Disabled,
    /// The caller's tier is too low.
    Denied,
    /// The command ran.
    Executed {
        /// Canonical name of the command.
        command: String,
    },
}

// =============================================================================
// Dispatcher
// =============================================================================

/// The process-wide dispatch engine.
///
/// Cheap to share behind an `Arc`; every entry point takes `&self` and may be
/// called concurrently for many messages at once.
pub struct Dispatcher {
    bot_name: String,
    registry: EventRegistry,
    access: AccessibilityResolver,
    prefixes: PrefixResolver,
    enabled: EnabledStateCache,
    ignored_guilds: HashSet<GuildId>,
    has_store: bool,
}

impl Dispatcher {
    /// Starts building a dispatcher for `bot`.
    pub fn builder(bot: BotInfo) -> DispatcherBuilder {
        DispatcherBuilder::new(bot)
    }

    // ─── Message pipeline ──────────────────────────────────────────────────

    /// Handles one inbound guild message.
    pub async fn on_message(&self, message: Arc<Message>, guild: Guild) -> DispatchResult<Outcome> {
        let span = debug_span!(
            "dispatch",
            guild = guild.id,
            channel = message.channel_id,
            author = message.author_id
        );
        self.route_message(message, guild).instrument(span).await
    }

    async fn route_message(&self, message: Arc<Message>, guild: Guild) -> DispatchResult<Outcome> {
        if message.author_is_bot || self.ignored_guilds.contains(&guild.id) {
            trace!("Message ignored");
            return Ok(Outcome::Ignored);
        }

        let content = message.content.to_lowercase();
        let Some(prefix) = self.match_prefix(guild.id, &content).await? else {
            return Ok(Outcome::NoPrefix);
        };

        let token = content[prefix.len()..]
            .split(char::is_whitespace)
            .next()
            .unwrap_or_default();
        let Some(command) = self.resolve_command(token) else {
            debug!(prefix = %prefix, token, "No command for token");
            return Ok(Outcome::UnknownCommand);
        };

        if !self.enabled.is_enabled(&command, message.channel_id).await? {
            debug!(command = %command.name(), "Command disabled in channel");
            return Ok(Outcome::Disabled);
        }

        let tier = self.access.tier_of(message.author_id, message.channel_id);
        if !tier.permits(command.accessibility()) {
            debug!(
                command = %command.name(),
                tier = %tier,
                required = %command.accessibility(),
                "Caller tier too low"
            );
            return Ok(Outcome::Denied);
        }

        debug!(command = %command.name(), prefix = %prefix, "Executing command");
        invoke_message_handler(&command, Arc::clone(&message), prefix).await?;
        self.on_command_done(message, &command).await?;

        Ok(Outcome::Executed {
            command: command.name().to_string(),
        })
    }

    /// Returns the first of (guild prefix, override prefix) that starts `content`.
    async fn match_prefix(&self, guild: GuildId, content: &str) -> StoreResult<Option<String>> {
        let configured = self.prefixes.get_prefix(guild).await?;
        if content.starts_with(configured.as_str()) {
            return Ok(Some(configured));
        }
        let fallback = self.prefixes.override_prefix();
        if content.starts_with(fallback) {
            return Ok(Some(fallback.to_string()));
        }
        Ok(None)
    }

    fn resolve_command(&self, token: &str) -> Option<Arc<Event>> {
        if token.is_empty() {
            return None;
        }
        self.registry.command(token).or_else(|| {
            self.registry
                .lookup_alias(token)
                .and_then(|name| self.registry.command(name))
        })
    }

    /// Runs every mention event for a message that mentions the bot.
    ///
    /// Mention events are not gated by enabled state or tier. Returns how
    /// many handlers ran.
    pub async fn on_mention(&self, message: Arc<Message>) -> DispatchResult<usize> {
        if message.author_is_bot {
            return Ok(0);
        }
        let events: Vec<_> = self.registry.events(Category::Mention).cloned().collect();
        for event in &events {
            invoke_message_handler(event, Arc::clone(&message), String::new()).await?;
        }
        Ok(events.len())
    }

    /// Runs every post-command hook, in registration order.
    ///
    /// A failing hook stops the remaining hooks and its error is returned.
    pub async fn on_command_done(
        &self,
        message: Arc<Message>,
        command: &Arc<Event>,
    ) -> DispatchResult<()> {
        for hook in self.registry.events(Category::CommandDone) {
            if let EventHandler::CommandDone(handler) = hook.handler() {
                hook.record_use();
                handler(Arc::clone(&message), Arc::clone(command))
                    .await
                    .map_err(|e| DispatchError::handler(hook.name(), e))?;
            }
        }
        Ok(())
    }

    /// Runs the join hooks enabled for `guild`.
    pub async fn on_guild_join(&self, guild: Guild) -> DispatchResult<usize> {
        self.run_guild_hooks(Category::GuildJoin, guild).await
    }

    /// Runs the leave hooks enabled for `guild`.
    pub async fn on_guild_leave(&self, guild: Guild) -> DispatchResult<usize> {
        self.run_guild_hooks(Category::GuildLeave, guild).await
    }

    async fn run_guild_hooks(&self, category: Category, guild: Guild) -> DispatchResult<usize> {
        let mut ran = 0;
        let hooks: Vec<_> = self.registry.events(category).cloned().collect();
        for hook in hooks {
            if !self.enabled.is_enabled(&hook, guild.id).await? {
                trace!(event = %hook.name(), guild = guild.id, "Guild hook disabled");
                continue;
            }
            if let EventHandler::Guild(handler) = hook.handler() {
                hook.record_use();
                handler(guild)
                    .await
                    .map_err(|e| DispatchError::handler(hook.name(), e))?;
                ran += 1;
            }
        }
        Ok(ran)
    }

    // ─── Queries ───────────────────────────────────────────────────────────

    /// The commands visible to the author of `message` in its channel.
    pub async fn command_listing(&self, message: &Message) -> DispatchResult<Vec<ModuleListing>> {
        let tier = self.access.tier_of(message.author_id, message.channel_id);
        let mut visible = Vec::new();
        for command in self.registry.events(Category::Command) {
            if tier.permits(command.accessibility())
                && self.enabled.is_enabled(command, message.channel_id).await?
            {
                visible.push(Arc::clone(command));
            }
        }
        Ok(listing::group(
            visible
                .iter()
                .map(|c| (c.module().map(|m| m.name()), c.name())),
        ))
    }

    /// [`command_listing`](Self::command_listing), rendered as text.
    pub async fn list_commands(&self, message: &Message) -> DispatchResult<String> {
        Ok(listing::render(&self.command_listing(message).await?))
    }

    /// The prefix configured for `guild`.
    pub async fn get_prefix(&self, guild: GuildId) -> StoreResult<String> {
        self.prefixes.get_prefix(guild).await
    }

    /// Sets the prefix for `guild`.
    pub async fn set_prefix(&self, guild: GuildId, prefix: impl Into<String>) -> StoreResult<()> {
        self.prefixes.set_prefix(guild, prefix).await
    }

    /// The prefix accepted in every guild.
    pub fn override_prefix(&self) -> &str {
        self.prefixes.override_prefix()
    }

    /// The prefix new guilds start with.
    pub fn default_prefix(&self) -> &str {
        self.prefixes.default_prefix()
    }

    /// Whether `event` is enabled in `channel`.
    pub async fn is_enabled(&self, event: &Event, channel: ChannelId) -> StoreResult<bool> {
        self.enabled.is_enabled(event, channel).await
    }

    /// Enables or disables the named event in `channel`.
    ///
    /// See [`EnabledStateCache::set_enabled`] for when this returns `false`.
    pub async fn set_enabled(
        &self,
        event_name: &str,
        channel: ChannelId,
        enabled: bool,
    ) -> StoreResult<bool> {
        self.enabled
            .set_enabled(&self.registry, event_name, channel, enabled)
            .await
    }

    /// The tier of `user` in `channel`.
    pub fn tier_of(&self, user: UserId, channel: ChannelId) -> Accessibility {
        self.access.tier_of(user, channel)
    }

    /// Invocation count of the named event.
    pub fn usage_count(&self, event_name: &str) -> Option<u64> {
        self.registry.find(event_name).map(|e| e.usage_count())
    }

    /// Invocations summed over all commands.
    pub fn total_usage(&self) -> u64 {
        self.registry
            .events(Category::Command)
            .map(|e| e.usage_count())
            .sum()
    }

    /// Looks up a command by name.
    pub fn get_command(&self, name: &str) -> Option<Arc<Event>> {
        self.registry.command(name)
    }

    /// Looks up an event of any category by name.
    pub fn get_event(&self, name: &str) -> Option<Arc<Event>> {
        self.registry.find(name)
    }

    /// Background events, in registration order.
    pub fn continuous_events(&self) -> Vec<Arc<Event>> {
        self.registry
            .events(Category::Continuous)
            .cloned()
            .collect()
    }

    /// The event registry.
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// The bot name.
    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Whether a backing store is configured.
    pub fn has_store(&self) -> bool {
        self.has_store
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bot_name", &self.bot_name)
            .field("events", &self.registry.len())
            .field("has_store", &self.has_store)
            .finish()
    }
}

async fn invoke_message_handler(
    event: &Event,
    message: Arc<Message>,
    prefix: String,
) -> DispatchResult<()> {
    if let EventHandler::Command(handler) = event.handler() {
        event.record_use();
        handler(message, prefix)
            .await
            .map_err(|e| DispatchError::handler(event.name(), e))?;
    }
    Ok(())
}

// =============================================================================
// DispatcherBuilder
// =============================================================================

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    bot: BotInfo,
    registry: EventRegistry,
    store: Option<BoxedStore>,
    permissions: Arc<dyn PermissionSource>,
    handles: Vec<DispatcherHandle>,
}

impl DispatcherBuilder {
    /// Creates a builder with an empty registry, no store, and no admins.
    pub fn new(bot: BotInfo) -> Self {
        Self {
            bot,
            registry: EventRegistry::new(),
            store: None,
            permissions: Arc::new(NoPermissions),
            handles: Vec::new(),
        }
    }

    /// Uses `registry` as the event set.
    pub fn registry(mut self, registry: EventRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Backs prefixes and enabled flags with `store`.
    pub fn store(mut self, store: BoxedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the backing store, or none for pure in-memory defaults.
    pub fn maybe_store(mut self, store: Option<BoxedStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the platform permission predicate.
    pub fn permissions(mut self, permissions: Arc<dyn PermissionSource>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Binds `handle` to the dispatcher once it is built.
    pub fn handle(mut self, handle: DispatcherHandle) -> Self {
        self.handles.push(handle);
        self
    }

    /// Claims `slot` and builds the dispatcher.
    ///
    /// With a store configured, the `identifier` and `event` tables are
    /// created first. If that fails the slot is released again. Every
    /// registered [`DispatcherHandle`] is bound to the result.
    pub async fn build(self, slot: &InstanceSlot) -> DispatchResult<Arc<Dispatcher>> {
        if self.handles.iter().any(DispatcherHandle::is_bound) {
            return Err(ConfigurationError::HandleAlreadyBound.into());
        }
        slot.claim("dispatcher")?;

        let prefixes = PrefixResolver::new(
            &self.bot.name,
            self.bot.default_prefix.clone(),
            self.store.clone(),
        );
        let enabled = EnabledStateCache::new(self.store.clone());

        let tables = async {
            prefixes.ensure_table().await?;
            enabled.ensure_table().await
        };
        if let Err(e) = tables.await {
            slot.release();
            return Err(e.into());
        }

        info!(
            bot = %self.bot.name,
            events = self.registry.len(),
            store = self.store.is_some(),
            "Dispatcher ready"
        );

        let dispatcher = Arc::new(Dispatcher {
            bot_name: self.bot.name,
            registry: self.registry,
            access: AccessibilityResolver::new(self.bot.developers, self.permissions),
            prefixes,
            enabled,
            ignored_guilds: self.bot.ignored_guilds.into_iter().collect(),
            has_store: self.store.is_some(),
        });
        for handle in &self.handles {
            if !handle.bind(&dispatcher) {
                warn!("Dispatcher handle was bound concurrently, leaving it unchanged");
            }
        }
        Ok(dispatcher)
    }
}
