//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::sqlite::{initialize_database, SqliteBindingRepository};
use crate::domain::models::Config;
use crate::handlers::HandlerDeps;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::credentials::StaticCredentialProvider;
use crate::services::HandlerRegistry;

pub use types::{Cli, Commands};

/// Load configuration from `path` if given, otherwise from `.areaflow/`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Build the registry of built-in handlers from configuration.
pub fn build_registry(config: &Config) -> Result<HandlerRegistry> {
    let credentials = Arc::new(StaticCredentialProvider::from_entries(&config.credentials));
    let deps = HandlerDeps::new(credentials, &config.http).context("Failed to build HTTP client")?;
    HandlerRegistry::with_builtin_handlers(&deps).context("Failed to register built-in handlers")
}

/// Everything a command needs: config, database, registry.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub repository: Arc<SqliteBindingRepository>,
    pub registry: Arc<HandlerRegistry>,
}

impl AppContext {
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        let registry = Arc::new(build_registry(&config)?);
        Ok(Self {
            repository: Arc::new(SqliteBindingRepository::new(pool.clone())),
            pool,
            registry,
            config,
        })
    }
}

/// Print an error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().map(ToString::to_string).collect();
        let body = serde_json::json!({ "success": false, "error": err.to_string(), "causes": chain });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
