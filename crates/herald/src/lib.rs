//! # Herald
//!
//! A command dispatch framework for chat bots.
//!
//! ## Overview
//!
//! Herald takes inbound platform events (guild messages, mentions, guild
//! joins and leaves) and routes them to registered handlers:
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────────────────┐
//! │   Adapter   │────▶│   Runtime    │────▶│ Dispatcher                 │
//! │ (platform)  │     │ (task/event) │     │  prefix → command → gates  │──▶ handler
//! └─────────────┘     └──────────────┘     │  then command-done hooks   │──▶ hooks
//!                                          └────────────────────────────┘
//! ```
//!
//! - **Prefixes** are per guild, stored and cached; `<botname>.` always works.
//! - **Enabled state** is per event and channel, stored and cached.
//! - **Tiers** (public, admin, developer) gate who may run a command.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = EventRegistry::new();
//!     registry.add_command(EventInfo::new("ping").alias("p"), |msg, _prefix| async move {
//!         info!(author = msg.author_id, "pong");
//!         Ok(())
//!     })?;
//!
//!     let runtime = HeraldRuntime::builder().registry(registry).build().await?;
//!     let (tx, rx) = tokio::sync::mpsc::channel(64);
//!     // hand `tx` to a platform adapter
//!     runtime.run(rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

/// Commonly used types for building a bot.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use herald_runtime::{HeraldConfig, HeraldRuntime, InboundEvent};

    // Event definitions
    pub use herald_core::{
        Accessibility, CancellationToken, Category, Event, EventInfo, HandlerResult, Module,
    };

    // Platform types
    pub use herald_core::{ChannelId, Guild, GuildId, Message, PermissionSource, UserId};

    // Stores
    pub use herald_core::{BoxedStore, MemoryStore, Store};

    // Dispatch
    pub use herald_framework::{
        BotInfo, Dispatcher, DispatcherHandle, EventRegistry, InstanceSlot, Outcome,
    };

    // Logging
    pub use herald_runtime::prelude::*;
}
