//! Core configuration types and data structures

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vellum_cache::CacheConfig;
use vellum_permissions::{PermissionConfig, PermissionRule};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Content repository settings
    pub repository: RepositoryConfig,
    /// Response cache settings
    pub cache: CacheConfig,
    /// Permission rules
    pub permissions: PermissionsConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Content repository settings
/// Most concurrent filesystem calls a single request may run
pub const MAX_CONCURRENT_IO: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory served as the repository root
    pub root: PathBuf,
    /// File names hidden from every listing, such as section index markers
    pub reserved_names: Vec<String>,
    /// Upper bound for a single filesystem call, in milliseconds
    pub fs_timeout_ms: u64,
    /// Concurrent filesystem calls allowed per request (1 to [`MAX_CONCURRENT_IO`])
    pub max_concurrent_io: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("content"),
            reserved_names: vec!["_index.md".to_string()],
            fs_timeout_ms: 5000,
            max_concurrent_io: 32,
        }
    }
}

impl RepositoryConfig {
    pub fn fs_timeout(&self) -> Duration {
        Duration::from_millis(self.fs_timeout_ms)
    }
}

/// Permission rule sources
///
/// Inline rules come first; rules from `rules_file` are appended after them,
/// so an inline rule wins a specificity tie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Rules declared directly in the configuration
    pub rules: Vec<PermissionRule>,
    /// JSON rule document, structured or `{pattern: [roles]}` form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

impl PermissionsConfig {
    /// The inline rules as a rule document
    pub fn inline(&self) -> PermissionConfig {
        PermissionConfig {
            rules: self.rules.clone(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
