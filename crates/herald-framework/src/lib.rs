//! # Herald Framework
//!
//! The dispatch engine of Herald.
//!
//! - [`EventRegistry`] collects events by category and enforces unique names
//!   and aliases.
//! - [`AccessibilityResolver`] computes a caller's tier.
//! - [`PrefixResolver`] and [`EnabledStateCache`] answer per-guild and
//!   per-channel questions from a lazily-filled write-through cache.
//! - [`Dispatcher`] routes messages, mentions, and guild events to handlers.
//! - [`DispatcherHandle`] lets handlers reach the dispatcher they run under.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use herald_core::{EventInfo, Guild, MemoryStore, Message};
//! use herald_framework::{BotInfo, Dispatcher, EventRegistry, InstanceSlot};
//!
//! let mut registry = EventRegistry::new();
//! registry.add_command(EventInfo::new("ping"), |msg, _prefix| async move {
//!     println!("pong for {}", msg.author_id);
//!     Ok(())
//! })?;
//!
//! let dispatcher = Dispatcher::builder(BotInfo::new("Herald"))
//!     .registry(registry)
//!     .store(Arc::new(MemoryStore::new()))
//!     .build(InstanceSlot::process())
//!     .await?;
//!
//! dispatcher
//!     .on_message(Arc::new(Message::new(1, 2, 3, "!ping")), Guild::new(3))
//!     .await?;
//! ```

pub mod accessibility;
pub mod dispatcher;
pub mod enabled;
pub mod error;
pub mod handle;
pub mod instance;
pub mod listing;
pub mod prefix;
pub mod registry;

pub use accessibility::AccessibilityResolver;
pub use dispatcher::{BotInfo, Dispatcher, DispatcherBuilder, Outcome};
pub use enabled::{EnabledStateCache, EventStateRow};
pub use error::{DispatchError, DispatchResult};
pub use handle::DispatcherHandle;
pub use instance::InstanceSlot;
pub use listing::{MISC_MODULE, ModuleListing};
pub use prefix::{IdentifierRow, PrefixResolver};
pub use registry::EventRegistry;
