//! Tracing subscriber bootstrap

use tracing_subscriber::EnvFilter;

use crate::error::{ConfigError, Result};
use crate::types::LoggingConfig;

/// Build the event filter, letting `RUST_LOG` override the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| {
        ConfigError::Validation(format!("invalid log level '{}': {}", config.level, e))
    })
}

/// Install the global fmt subscriber
///
/// Returns `false` when a subscriber was already installed, which leaves the
/// existing one in place. Safe to call from every test.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init_tracing(&config).unwrap();
        assert!(!init_tracing(&config).unwrap());
    }

    #[test]
    fn test_filter_accepts_directives() {
        let config = LoggingConfig {
            level: "warn,vellum_browse=debug".to_string(),
            json: true,
        };
        assert!(build_filter(&config).is_ok());
    }
}
