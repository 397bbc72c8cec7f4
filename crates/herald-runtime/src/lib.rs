//! Herald Runtime - process wiring for the Herald dispatch framework.
//!
//! This crate provides:
//! - Layered configuration loading (`herald.toml`, `HERALD_*` variables)
//! - Logging initialization from the `[logging]` section
//! - [`HeraldRuntime`], which builds the process-wide dispatcher, feeds it
//!   inbound platform events, and runs continuous events until shutdown
//!
//! ```ignore
//! use herald_runtime::{HeraldRuntime, InboundEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::builder().registry(registry).build().await?;
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(64);
//!     // hand `tx` to the platform adapter
//!     runtime.run(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, HeraldConfig, LoggingConfig, StoreBackend,
    StoreConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HeraldRuntime, InboundEvent, RuntimeBuilder};

// Re-export tracing for use by handler crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
