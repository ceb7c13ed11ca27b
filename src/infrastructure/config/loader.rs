use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid tick_interval_ms: {0}. Must be at least 1")]
    InvalidTickInterval(u64),

    #[error("Invalid max_concurrent_evaluations: {0}. Must be at least 1")]
    InvalidMaxConcurrentEvaluations(usize),

    #[error("Invalid handler_timeout_secs: {0}. Must be at least 1")]
    InvalidHandlerTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

const PROJECT_CONFIG: &str = ".areaflow/config.yaml";
const LOCAL_CONFIG: &str = ".areaflow/local.yaml";
const ENV_PREFIX: &str = "AREAFLOW_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .areaflow/config.yaml
    /// 3. .areaflow/local.yaml (optional overrides)
    /// 4. Environment variables (AREAFLOW_* prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(Path::new("."))
    }

    /// Same as [`load`](Self::load), resolving the project files under `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join(PROJECT_CONFIG)))
            .merge(Yaml::file(dir.join(LOCAL_CONFIG)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.engine.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidTickInterval(config.engine.tick_interval_ms));
        }

        if config.engine.max_concurrent_evaluations == 0 {
            return Err(ConfigError::InvalidMaxConcurrentEvaluations(
                config.engine.max_concurrent_evaluations,
            ));
        }

        if config.engine.handler_timeout_secs == 0 {
            return Err(ConfigError::InvalidHandlerTimeout(config.engine.handler_timeout_secs));
        }

        for entry in &config.credentials {
            if entry.provider.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "credential provider for user {} cannot be empty",
                    entry.user_id
                )));
            }
            if entry.access_token.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} access token for user {} cannot be empty",
                    entry.provider, entry.user_id
                )));
            }
        }

        Ok(())
    }
}
