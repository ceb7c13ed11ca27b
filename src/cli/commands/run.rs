//! `areaflow run`: the long-running engine process.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio::sync::watch;
use tracing::{error, info};

use crate::cli::output::{output, CommandOutput};
use crate::cli::AppContext;
use crate::domain::ports::BindingRepository;
use crate::services::{BindingScheduler, Evaluator, SchedulerStatsSnapshot};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the tick interval (milliseconds)
    #[arg(long)]
    pub tick_interval_ms: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
pub struct RunSummary {
    pub stats: SchedulerStatsSnapshot,
}

impl CommandOutput for RunSummary {
    fn to_human(&self) -> String {
        let s = &self.stats;
        format!(
            "Scheduler stopped after {} tick(s): {} dispatched, {} delivered, {} not triggered, \
             {} check failure(s), {} execute failure(s), {} missing handler(s)",
            s.ticks, s.dispatched, s.delivered, s.not_triggered, s.check_failures, s.execute_failures, s.missing_handlers,
        )
    }
}

/// Run the scheduler until Ctrl-C.
///
/// Only one `run` process may point at a given database; a second one
/// would deliver every reaction twice.
pub async fn execute(args: RunArgs, mut ctx: AppContext, json_mode: bool) -> Result<()> {
    if let Some(ms) = args.tick_interval_ms {
        ctx.config.engine.tick_interval_ms = ms.max(1);
    }

    let repository: Arc<dyn BindingRepository> = ctx.repository.clone();
    let evaluator = Arc::new(Evaluator::from_config(
        Arc::clone(&ctx.registry),
        Arc::clone(&repository),
        &ctx.config.engine,
    ));
    let scheduler = BindingScheduler::new(repository, evaluator, ctx.config.engine.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl-C; stop the process with a signal");
                std::future::pending::<()>().await;
            }
        }
    });

    info!(
        database = %ctx.config.database.path,
        actions = ctx.registry.list_actions().len(),
        reactions = ctx.registry.list_reactions().len(),
        "areaflow engine starting"
    );
    let stats = scheduler.run(shutdown_rx).await;
    ctx.pool.close().await;

    output(&RunSummary { stats }, json_mode);
    Ok(())
}
