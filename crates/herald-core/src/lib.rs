//! # Herald Core
//!
//! Foundation types for the Herald command dispatch framework.
//!
//! This crate holds everything the dispatch engine is built from, without the
//! engine itself:
//!
//! - **Events**: definitions, categories, accessibility tiers, handlers
//!   ([`EventInfo`], [`Event`], [`Category`], [`Accessibility`], [`EventHandler`])
//! - **Platform types**: what an adapter hands to the dispatcher
//!   ([`Message`], [`Guild`], [`PermissionSource`])
//! - **Store**: the abstract relational store and an in-memory implementation
//!   ([`Store`], [`TableSchema`], [`MemoryStore`])
//! - **Cache**: the lazily-populated, write-through keyed cache shared by
//!   prefix and enabled-state resolution ([`StoreCache`], [`Record`])
//!
//! The dispatcher lives in `herald-framework`; process wiring in
//! `herald-runtime`.

pub mod cache;
pub mod error;
pub mod event;
pub mod platform;
pub mod store;

pub use cache::{Record, StoreCache};
pub use error::{ConfigurationError, ConfigurationResult, StoreError, StoreResult};
pub use event::{
    Accessibility, Category, CommandDoneFn, ContinuousFn, Event, EventHandler, EventInfo,
    GuildFn, HandlerResult, MessageFn, Module,
};
pub use platform::{ChannelId, Guild, GuildId, Message, NoPermissions, PermissionSource, UserId};
pub use store::{BoxedStore, Column, ColumnType, MemoryStore, Row, Store, TableSchema};

/// Re-exported so handlers can accept a cancellation token without a direct
/// `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
