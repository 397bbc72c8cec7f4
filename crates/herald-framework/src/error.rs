//! Error types for the Herald framework.

use thiserror::Error;

use herald_core::{ConfigurationError, StoreError};

/// Errors surfaced by the dispatcher's public entry points.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Startup wiring failed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A store read or write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An event handler returned an error.
    #[error("handler for '{event}' failed: {source}")]
    Handler {
        /// Name of the failing event.
        event: String,
        /// The handler's error.
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Wraps a handler failure.
    pub fn handler(event: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Handler {
            event: event.into(),
            source,
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
