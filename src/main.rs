//! Areaflow CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use areaflow::cli::commands::{binding, catalog, run};
use areaflow::cli::{build_registry, handle_error, load_config, AppContext, Cli, Commands};
use areaflow::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command, cli.config.as_deref(), cli.json).await {
        handle_error(err, cli.json);
    }
}

async fn dispatch(command: Commands, config_path: Option<&std::path::Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;

    // The engine logs per its config; one-shot commands only surface warnings on stderr.
    let _logger = match command {
        Commands::Run(_) => {
            let log_config = LogConfig::try_from(&config.logging).map_err(anyhow::Error::msg)?;
            Some(LoggerImpl::init(&log_config)?)
        }
        _ => {
            tracing_subscriber::registry()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    };

    match command {
        Commands::Run(args) => run::execute(args, AppContext::open(config).await?, json).await,
        Commands::Catalog(args) => catalog::execute(args, &build_registry(&config)?, json),
        Commands::Binding(args) => binding::execute(args, AppContext::open(config).await?, json).await,
    }
}
