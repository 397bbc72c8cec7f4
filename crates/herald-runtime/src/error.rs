//! Runtime error types.

use thiserror::Error;

use herald_framework::DispatchError;

use crate::config::ConfigError;

/// Errors that stop the runtime from starting.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The dispatcher could not be built.
    #[error("Failed to build dispatcher: {0}")]
    Dispatcher(#[from] DispatchError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
