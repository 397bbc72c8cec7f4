//! Unified error types for the Herald core.
//!
//! Dispatch-level errors (which wrap these) live in `herald-framework`.

use thiserror::Error;

use crate::event::Category;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while wiring the dispatch engine at startup.
///
/// Every variant is fatal: the caller is expected to abort initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// An event name is already taken somewhere in the registry.
    #[error("event name '{name}' is already registered (as a {existing} event)")]
    DuplicateName {
        /// The colliding canonical name.
        name: String,
        /// Category of the event that already owns the name.
        existing: Category,
    },

    /// An alias is already bound to another event.
    #[error("alias '{alias}' of '{event}' is already bound to '{existing}'")]
    DuplicateAlias {
        /// The colliding alias.
        alias: String,
        /// The event being registered.
        event: String,
        /// The event that already owns the alias.
        existing: String,
    },

    /// A new event name is already bound as an alias.
    #[error("event name '{name}' is already an alias of '{existing}'")]
    NameTakenByAlias {
        /// The colliding canonical name.
        name: String,
        /// The event that owns the alias.
        existing: String,
    },

    /// An alias collides with a canonical event name.
    #[error("'{token}' of '{event}' collides with the name of event '{existing}'")]
    AliasShadowsName {
        /// The colliding token.
        token: String,
        /// The event being registered.
        event: String,
        /// The event whose name is shadowed.
        existing: String,
    },

    /// Event names must contain at least one non-whitespace character.
    #[error("event name must not be empty")]
    EmptyName,

    /// The handler shape does not fit the category it is registered under.
    #[error("'{name}' cannot be registered as a {category} event with this handler")]
    HandlerMismatch {
        /// The event being registered.
        name: String,
        /// The requested category.
        category: Category,
    },

    /// A dispatcher handle was passed to a second dispatcher.
    #[error("dispatcher handle is already bound to another dispatcher")]
    HandleAlreadyBound,

    /// A process-wide singleton was constructed twice.
    #[error("{what} is already constructed in this process")]
    AlreadyConstructed {
        /// What was constructed twice.
        what: &'static str,
    },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors returned by a backing store.
///
/// These surface unchanged from the public operation that triggered the store
/// access; nothing in Herald retries them.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Reading a row failed.
    #[error("failed to read from table '{table}': {reason}")]
    Read {
        /// The table being read.
        table: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// Writing a row failed.
    #[error("failed to write to table '{table}': {reason}")]
    Write {
        /// The table being written.
        table: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// The table does not exist or a row does not fit its schema.
    #[error("schema error on table '{table}': {reason}")]
    Schema {
        /// The affected table.
        table: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// A stored row could not be converted into its typed record.
    #[error("failed to decode row from table '{table}': {reason}")]
    Decode {
        /// The affected table.
        table: &'static str,
        /// Reason for failure.
        reason: String,
    },
}

impl StoreError {
    /// Creates a read error.
    pub fn read(table: &'static str, reason: impl Into<String>) -> Self {
        Self::Read {
            table,
            reason: reason.into(),
        }
    }

    /// Creates a write error.
    pub fn write(table: &'static str, reason: impl Into<String>) -> Self {
        Self::Write {
            table,
            reason: reason.into(),
        }
    }

    /// Creates a schema error.
    pub fn schema(table: &'static str, reason: impl Into<String>) -> Self {
        Self::Schema {
            table,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for configuration-time operations.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
