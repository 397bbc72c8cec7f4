//! Configuration for a Herald process.
//!
//! Settings are read from `herald.toml` (or YAML with the `yaml-config`
//! feature), layered with `HERALD_*` environment variables, and validated
//! before the runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, HeraldConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    SpanEventConfig, StoreBackend, StoreConfig,
};
pub use validation::validate_config;
