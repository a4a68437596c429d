//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use vellum_permissions::PermissionConfig;

use crate::{
    error::{ConfigError, Result},
    types::{AppConfig, MAX_CONCURRENT_IO},
};

const DEFAULT_ENV_PREFIX: &str = "VELLUM";
const ENV_SEPARATOR: &str = "__";

/// Configuration manager
///
/// Layers, lowest precedence first: built-in defaults, the config file
/// (TOML, JSON or YAML by extension, optional), then environment variables
/// such as `VELLUM__CACHE__MAX_ENTRIES=500`.
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Create with custom config path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vellum")
            .join("config.toml")
    }

    /// Load and validate the configuration
    pub fn load(&self) -> Result<AppConfig> {
        let builder = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator(ENV_SEPARATOR)
                    .list_separator(",")
                    .with_list_parse_key("repository.reserved_names")
                    .try_parsing(true),
            );

        let app_config: AppConfig = builder.build()?.try_deserialize()?;
        Self::validate(&app_config)?;

        info!(
            path = %self.config_path.display(),
            root = %app_config.repository.root.display(),
            "configuration loaded"
        );
        Ok(app_config)
    }

    /// Load a configuration file that must exist
    pub fn load_required(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(
                self.config_path.display().to_string(),
            ));
        }
        self.load()
    }

    /// Write the configuration as TOML
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let toml = toml::to_string(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }

    /// Reject settings the services cannot run with
    pub fn validate(config: &AppConfig) -> Result<()> {
        let repository = &config.repository;
        if repository.root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "repository.root must not be empty".to_string(),
            ));
        }
        if repository.fs_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "repository.fs_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if !(1..=MAX_CONCURRENT_IO).contains(&repository.max_concurrent_io) {
            return Err(ConfigError::Validation(format!(
                "repository.max_concurrent_io must be between 1 and {}",
                MAX_CONCURRENT_IO
            )));
        }

        config.cache.validate()?;
        config.permissions.inline().validate()?;

        EnvFilter::try_new(&config.logging.level).map_err(|e| {
            ConfigError::Validation(format!(
                "logging.level '{}' is not a valid filter: {}",
                config.logging.level, e
            ))
        })?;

        Ok(())
    }

    /// Assemble the full rule set: inline rules, then the rules file
    pub fn load_permissions(config: &AppConfig) -> Result<PermissionConfig> {
        let mut rules = config.permissions.inline();
        if let Some(path) = &config.permissions.rules_file {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            let file_rules = PermissionConfig::load(path)?;
            debug!(
                path = %path.display(),
                count = file_rules.rules().len(),
                "loaded permission rules file"
            );
            rules.extend(file_rules);
        }
        Ok(rules)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
