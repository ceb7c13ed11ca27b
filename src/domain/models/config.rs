use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Main configuration structure for areaflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scheduler and evaluator configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Upstream HTTP configuration shared by built-in handlers
    #[serde(default)]
    pub http: HttpConfig,

    /// Static per-user access tokens
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".areaflow/areaflow.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// `sqlx` connection URL for the configured path.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// When new action state is committed relative to the reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Persist state, then run the reaction. A failed reaction is not
    /// redelivered.
    #[default]
    AtMostOnce,
    /// Run the reaction, then persist state only if it succeeded. A failed
    /// reaction is re-detected on the next tick.
    AtLeastOnce,
}

/// Scheduler and evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Period between scheduler ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Upper bound on evaluations running at once across all bindings
    #[serde(default = "default_max_concurrent_evaluations")]
    pub max_concurrent_evaluations: usize,

    /// Timeout applied to every individual check() and execute() call
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,

    /// Hard deadline for draining in-flight evaluations at shutdown
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Delivery guarantee for reactions
    #[serde(default)]
    pub delivery: DeliveryMode,
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_max_concurrent_evaluations() -> usize {
    32
}

const fn default_handler_timeout_secs() -> u64 {
    30
}

const fn default_shutdown_grace_secs() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_concurrent_evaluations: default_max_concurrent_evaluations(),
            handler_timeout_secs: default_handler_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            delivery: DeliveryMode::default(),
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Upstream HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpConfig {
    /// User-Agent sent to upstream APIs
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Base URL of the GitHub REST API
    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,
}

fn default_user_agent() -> String {
    format!("areaflow/{}", env!("CARGO_PKG_VERSION"))
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            github_api_base: default_github_api_base(),
        }
    }
}

/// One access token for one user on one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CredentialEntry {
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
}
