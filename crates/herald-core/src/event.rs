//! Event definitions.
//!
//! An [`Event`] is a registered, named unit of behaviour: a command, a mention
//! reaction, a join/leave hook, a post-command hook, or a background task. All
//! kinds share one definition ([`EventInfo`]) and differ only in their
//! [`Category`] and [`EventHandler`] shape.
//!
//! ```rust,ignore
//! use herald_core::{Accessibility, EventHandler, EventInfo};
//!
//! let info = EventInfo::new("Ping")
//!     .alias("p")
//!     .description("Checks that the bot is alive")
//!     .accessibility(Accessibility::Public);
//!
//! let handler = EventHandler::command(|message, prefix| async move {
//!     println!("pong ({prefix}) for {}", message.author_id);
//!     Ok(())
//! });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::platform::{Guild, Message};

// =============================================================================
// Accessibility
// =============================================================================

/// Permission tier gating who may invoke an event.
///
/// Tiers are totally ordered: `DeveloperOnly > AdminOnly > Public`. A caller
/// may invoke an event when their tier is at least the event's tier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    /// Anyone.
    #[default]
    Public,
    /// Users holding the manage-permissions right in the channel.
    AdminOnly,
    /// Users on the developer allow-list.
    DeveloperOnly,
}

impl Accessibility {
    /// Returns the tier name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::AdminOnly => "admin_only",
            Self::DeveloperOnly => "developer_only",
        }
    }

    /// Whether a caller holding `self` may use something requiring `required`.
    pub fn permits(self, required: Accessibility) -> bool {
        self >= required
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Category
// =============================================================================

/// The closed set of event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Prefix-triggered commands.
    Command,
    /// Reactions to messages that mention the bot.
    Mention,
    /// Hooks run after every executed command.
    CommandDone,
    /// Hooks run when the bot joins a guild.
    GuildJoin,
    /// Hooks run when the bot leaves a guild.
    GuildLeave,
    /// Background tasks.
    Continuous,
}

impl Category {
    /// All categories, in a stable order.
    pub const ALL: [Category; 6] = [
        Self::Command,
        Self::Mention,
        Self::CommandDone,
        Self::GuildJoin,
        Self::GuildLeave,
        Self::Continuous,
    ];

    /// Returns the category name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Mention => "mention",
            Self::CommandDone => "command_done",
            Self::GuildJoin => "guild_join",
            Self::GuildLeave => "guild_leave",
            Self::Continuous => "continuous",
        }
    }

    /// Whether `handler` has the shape this category invokes.
    pub fn accepts(&self, handler: &EventHandler) -> bool {
        matches!(
            (self, handler),
            (Self::Command | Self::Mention, EventHandler::Command(_))
                | (Self::CommandDone, EventHandler::CommandDone(_))
                | (Self::GuildJoin | Self::GuildLeave, EventHandler::Guild(_))
                | (Self::Continuous, EventHandler::Continuous(_))
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Module
// =============================================================================

/// A named group of events, used for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    name: String,
    default_enabled: bool,
}

impl Module {
    /// Creates an enabled-by-default module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_enabled: true,
        }
    }

    /// Sets whether the module is enabled by default.
    pub fn default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the module is enabled by default.
    pub fn is_default_enabled(&self) -> bool {
        self.default_enabled
    }

    /// Renders the module state line shown in status listings.
    pub fn state(&self) -> String {
        format!("{}: ACTIVE", self.name)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Result returned by every event handler.
pub type HandlerResult = anyhow::Result<()>;

/// Handler for commands and mentions: `(message, matched prefix)`.
pub type MessageFn =
    Arc<dyn Fn(Arc<Message>, String) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Handler for guild join/leave hooks.
pub type GuildFn = Arc<dyn Fn(Guild) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Handler for post-command hooks: `(message, executed command)`.
pub type CommandDoneFn =
    Arc<dyn Fn(Arc<Message>, Arc<Event>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Handler for background tasks; it should return once the token is cancelled.
pub type ContinuousFn =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// The handler bound to an event, one variant per invocation shape.
#[derive(Clone)]
pub enum EventHandler {
    /// Invoked with the message and the prefix that matched.
    Command(MessageFn),
    /// Invoked with the affected guild.
    Guild(GuildFn),
    /// Invoked with the message and the command that just ran.
    CommandDone(CommandDoneFn),
    /// Spawned once and run until cancelled.
    Continuous(ContinuousFn),
}

impl EventHandler {
    /// Wraps an async closure taking `(message, prefix)`.
    pub fn command<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Message>, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Command(Arc::new(move |message: Arc<Message>, prefix: String| {
            f(message, prefix).boxed()
        }))
    }

    /// Wraps an async closure taking the affected guild.
    pub fn guild<F, Fut>(f: F) -> Self
    where
        F: Fn(Guild) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Guild(Arc::new(move |guild: Guild| f(guild).boxed()))
    }

    /// Wraps an async closure taking `(message, executed command)`.
    pub fn command_done<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Message>, Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::CommandDone(Arc::new(move |message: Arc<Message>, command: Arc<Event>| {
            f(message, command).boxed()
        }))
    }

    /// Wraps an async closure taking a cancellation token.
    pub fn continuous<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Continuous(Arc::new(move |token: CancellationToken| f(token).boxed()))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Guild(_) => "guild",
            Self::CommandDone(_) => "command_done",
            Self::Continuous(_) => "continuous",
        }
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventHandler").field(&self.kind()).finish()
    }
}

// =============================================================================
// EventInfo
// =============================================================================

const DEFAULT_DESCRIPTION: &str = "description not set for this command!";
const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong!";

/// The declarative part of an event definition.
///
/// Built with chained setters; unset fields keep Herald's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Event name (canonicalised to lowercase at registration).
    pub name: String,
    /// Alternate tokens resolving to this event.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Human-readable description.
    pub description: String,
    /// Usage lines; empty means "just the event name".
    #[serde(default)]
    pub usage: Vec<String>,
    /// Text shown to users when the event fails.
    pub error_message: String,
    /// Whether the event may be disabled per channel.
    pub can_be_disabled: bool,
    /// Enabled state for channels with no stored override.
    pub default_enabled: bool,
    /// Owning module, if any.
    #[serde(default)]
    pub module: Option<Module>,
    /// Required caller tier.
    #[serde(default)]
    pub accessibility: Accessibility,
}

impl EventInfo {
    /// Starts a definition with the given name and default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: DEFAULT_DESCRIPTION.to_string(),
            usage: Vec::new(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            can_be_disabled: true,
            default_enabled: true,
            module: None,
            accessibility: Accessibility::Public,
        }
    }

    /// Adds one alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Adds several aliases.
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a usage line.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage.push(usage.into());
        self
    }

    /// Sets the user-facing error text.
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Sets whether the event may be disabled.
    pub fn can_be_disabled(mut self, can_be_disabled: bool) -> Self {
        self.can_be_disabled = can_be_disabled;
        self
    }

    /// Sets the enabled state used when nothing is stored.
    pub fn default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    /// Sets the owning module.
    pub fn module(mut self, module: Module) -> Self {
        self.module = Some(module);
        self
    }

    /// Sets the required caller tier.
    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Lowercases name and aliases and fills in the default usage line.
    pub fn canonicalize(mut self) -> Self {
        self.name = self.name.trim().to_lowercase();
        for alias in &mut self.aliases {
            *alias = alias.trim().to_lowercase();
        }
        if self.usage.is_empty() {
            self.usage.push(self.name.clone());
        }
        self
    }
}

// =============================================================================
// Event
// =============================================================================

/// A registered event.
///
/// The definition is immutable once registered; only the usage counter moves.
/// Per-channel enabled flags are not stored here: they live in the
/// framework's `EnabledStateCache`, keyed by event name and channel, and are
/// read through `Dispatcher::is_enabled`.
pub struct Event {
    info: EventInfo,
    category: Category,
    handler: EventHandler,
    uses: AtomicU64,
}

impl Event {
    /// Creates an event from a canonicalised definition.
    pub fn new(category: Category, info: EventInfo, handler: EventHandler) -> Self {
        Self {
            info,
            category,
            handler,
            uses: AtomicU64::new(0),
        }
    }

    /// Canonical (lowercase) name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Aliases bound to this event.
    pub fn aliases(&self) -> &[String] {
        &self.info.aliases
    }

    /// Description text.
    pub fn description(&self) -> &str {
        &self.info.description
    }

    /// Usage lines.
    pub fn usage(&self) -> &[String] {
        &self.info.usage
    }

    /// User-facing error text.
    pub fn error_message(&self) -> &str {
        &self.info.error_message
    }

    /// Whether the event may be disabled per channel.
    pub fn can_be_disabled(&self) -> bool {
        self.info.can_be_disabled
    }

    /// Enabled state for channels without a stored override.
    pub fn default_enabled(&self) -> bool {
        self.info.default_enabled
    }

    /// Owning module.
    pub fn module(&self) -> Option<&Module> {
        self.info.module.as_ref()
    }

    /// Required caller tier.
    pub fn accessibility(&self) -> Accessibility {
        self.info.accessibility
    }

    /// Event category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Full definition.
    pub fn info(&self) -> &EventInfo {
        &self.info
    }

    /// Bound handler.
    pub fn handler(&self) -> &EventHandler {
        &self.handler
    }

    /// How many times the handler has been invoked.
    pub fn usage_count(&self) -> u64 {
        self.uses.load(Ordering::Relaxed)
    }

    /// Counts one invocation.
    pub fn record_use(&self) {
        self.uses.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.info.name)
            .field("category", &self.category)
            .field("accessibility", &self.info.accessibility)
            .field("uses", &self.usage_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Accessibility::DeveloperOnly.permits(Accessibility::Public));
        assert!(Accessibility::DeveloperOnly.permits(Accessibility::AdminOnly));
        assert!(Accessibility::AdminOnly.permits(Accessibility::Public));
        assert!(!Accessibility::Public.permits(Accessibility::AdminOnly));
        assert!(!Accessibility::AdminOnly.permits(Accessibility::DeveloperOnly));
    }

    #[test]
    fn test_canonicalize_defaults_usage_to_name() {
        let info = EventInfo::new(" Ping ").alias("P").canonicalize();
        assert_eq!(info.name, "ping");
        assert_eq!(info.aliases, vec!["p".to_string()]);
        assert_eq!(info.usage, vec!["ping".to_string()]);

        let explicit = EventInfo::new("echo").usage("echo <text>").canonicalize();
        assert_eq!(explicit.usage, vec!["echo <text>".to_string()]);
    }

    #[test]
    fn test_category_accepts_matching_handler() {
        let command = EventHandler::command(|_, _| async { Ok(()) });
        let guild = EventHandler::guild(|_| async { Ok(()) });

        assert!(Category::Command.accepts(&command));
        assert!(Category::Mention.accepts(&command));
        assert!(!Category::GuildJoin.accepts(&command));
        assert!(Category::GuildLeave.accepts(&guild));
        assert!(!Category::Continuous.accepts(&guild));
    }

    #[test]
    fn test_usage_counter() {
        let event = Event::new(
            Category::Command,
            EventInfo::new("ping").canonicalize(),
            EventHandler::command(|_, _| async { Ok(()) }),
        );
        assert_eq!(event.usage_count(), 0);
        event.record_use();
        event.record_use();
        assert_eq!(event.usage_count(), 2);
    }

    #[test]
    fn test_module_state_line() {
        let module = Module::new("Fun").default_enabled(false);
        assert_eq!(module.state(), "Fun: ACTIVE");
        assert!(!module.is_default_enabled());
    }
}
