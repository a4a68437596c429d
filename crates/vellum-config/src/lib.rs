//! Vellum configuration
//!
//! Strongly typed settings for the repository, cache, permission rules and
//! logging, loaded from an optional file layered under `VELLUM__*`
//! environment variables and validated once.

pub mod error;
pub mod logging;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use logging::init_tracing;
pub use manager::ConfigManager;
pub use types::{AppConfig, LoggingConfig, PermissionsConfig, RepositoryConfig, MAX_CONCURRENT_IO};
