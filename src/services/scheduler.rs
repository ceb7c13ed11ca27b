//! Binding scheduler.
//!
//! A fixed-interval loop that lists every active binding on each tick and
//! dispatches the ones that are not already in flight to the evaluator.
//! Ticks never wait for evaluations: each evaluation runs in its own task,
//! holding an in-flight lease and a capacity permit until it finishes.
//!
//! Exactly one scheduler may run against a given database. Two processes
//! polling the same bindings would each deliver every reaction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::EngineConfig;
use crate::domain::ports::BindingRepository;
use crate::services::evaluator::{EvaluationOutcome, Evaluator};
use crate::services::inflight_guard::InFlightGuard;

/// Lock-free counters kept across the scheduler's lifetime.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: AtomicU64,
    dispatched: AtomicU64,
    skipped_in_flight: AtomicU64,
    skipped_at_capacity: AtomicU64,
    listing_failures: AtomicU64,
    delivered: AtomicU64,
    not_triggered: AtomicU64,
    check_failures: AtomicU64,
    execute_failures: AtomicU64,
    missing_handlers: AtomicU64,
    state_persist_failures: AtomicU64,
    panics: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStatsSnapshot {
    /// Ticks started.
    pub ticks: u64,
    /// Evaluations spawned.
    pub dispatched: u64,
    /// Bindings skipped because an earlier evaluation was still running.
    pub skipped_in_flight: u64,
    /// Bindings skipped because every evaluation slot was taken.
    pub skipped_at_capacity: u64,
    /// Ticks that could not list active bindings.
    pub listing_failures: u64,
    /// Evaluations ending in [`EvaluationOutcome::Delivered`].
    pub delivered: u64,
    /// Evaluations ending in [`EvaluationOutcome::NotTriggered`].
    pub not_triggered: u64,
    /// Evaluations ending in [`EvaluationOutcome::CheckFailed`].
    pub check_failures: u64,
    /// Evaluations ending in [`EvaluationOutcome::ExecuteFailed`].
    pub execute_failures: u64,
    /// Action or reaction key not registered.
    pub missing_handlers: u64,
    /// Evaluations ending in [`EvaluationOutcome::StatePersistFailed`].
    pub state_persist_failures: u64,
    /// Evaluation tasks that panicked.
    pub panics: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl SchedulerStats {
    /// Count one finished evaluation under its outcome.
    pub fn record(&self, outcome: &EvaluationOutcome) {
        let counter = match outcome {
            EvaluationOutcome::Delivered => &self.delivered,
            EvaluationOutcome::NotTriggered => &self.not_triggered,
            EvaluationOutcome::CheckFailed(_) => &self.check_failures,
            EvaluationOutcome::ExecuteFailed(_) => &self.execute_failures,
            EvaluationOutcome::ActionHandlerMissing | EvaluationOutcome::ReactionHandlerMissing => {
                &self.missing_handlers
            }
            EvaluationOutcome::StatePersistFailed(_) => &self.state_persist_failures,
        };
        bump(counter);
    }

    /// Read every counter. Counters are read one by one, not atomically as a set.
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        SchedulerStatsSnapshot {
            ticks: load(&self.ticks),
            dispatched: load(&self.dispatched),
            skipped_in_flight: load(&self.skipped_in_flight),
            skipped_at_capacity: load(&self.skipped_at_capacity),
            listing_failures: load(&self.listing_failures),
            delivered: load(&self.delivered),
            not_triggered: load(&self.not_triggered),
            check_failures: load(&self.check_failures),
            execute_failures: load(&self.execute_failures),
            missing_handlers: load(&self.missing_handlers),
            state_persist_failures: load(&self.state_persist_failures),
            panics: load(&self.panics),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Active bindings returned by the repository.
    pub listed: usize,
    /// Evaluations spawned this tick.
    pub dispatched: usize,
    /// Bindings whose previous evaluation had not finished.
    pub skipped_in_flight: usize,
    /// Bindings left for a later tick because capacity was exhausted.
    pub skipped_at_capacity: usize,
}

/// Owns the tick loop, the in-flight guard and the pool of running
/// evaluation tasks.
pub struct BindingScheduler {
    repo: Arc<dyn BindingRepository>,
    evaluator: Arc<Evaluator>,
    guard: InFlightGuard,
    permits: Arc<Semaphore>,
    config: EngineConfig,
    stats: Arc<SchedulerStats>,
    tasks: Mutex<JoinSet<()>>,
}

impl BindingScheduler {
    /// Capacity comes from `config.max_concurrent_evaluations`. Nothing runs
    /// until [`tick`](Self::tick) or [`run`](Self::run) is called.
    pub fn new(repo: Arc<dyn BindingRepository>, evaluator: Arc<Evaluator>, config: EngineConfig) -> Self {
        Self {
            repo,
            evaluator,
            guard: InFlightGuard::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_evaluations)),
            config,
            stats: Arc::new(SchedulerStats::default()),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// The guard holding one lease per binding currently being evaluated.
    pub fn guard(&self) -> &InFlightGuard {
        &self.guard
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one tick: list active bindings and dispatch those not in flight.
    ///
    /// Returns as soon as every eligible binding has been spawned.
    #[instrument(name = "tick", skip(self))]
    pub async fn tick(&self) -> TickReport {
        bump(&self.stats.ticks);
        let mut report = TickReport::default();

        let bindings = match self.repo.list_active().await {
            Ok(bindings) => bindings,
            Err(e) => {
                bump(&self.stats.listing_failures);
                error!(error = %e, "Failed to list active bindings");
                return report;
            }
        };
        report.listed = bindings.len();

        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.try_join_next() {
            self.reap(result);
        }

        for binding in bindings {
            let Some(lease) = self.guard.try_acquire(binding.id) else {
                debug!(binding_id = %binding.id, "Binding still in flight, skipping");
                bump(&self.stats.skipped_in_flight);
                report.skipped_in_flight += 1;
                continue;
            };

            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                debug!(binding_id = %binding.id, "Evaluation capacity exhausted, skipping");
                bump(&self.stats.skipped_at_capacity);
                report.skipped_at_capacity += 1;
                continue;
            };

            let evaluator = Arc::clone(&self.evaluator);
            let stats = Arc::clone(&self.stats);
            tasks.spawn(async move {
                let _lease = lease;
                let _permit = permit;
                let outcome = evaluator.evaluate(&binding).await;
                stats.record(&outcome);
            });
            bump(&self.stats.dispatched);
            report.dispatched += 1;
        }

        debug!(
            listed = report.listed,
            dispatched = report.dispatched,
            skipped_in_flight = report.skipped_in_flight,
            skipped_at_capacity = report.skipped_at_capacity,
            "Tick complete"
        );
        report
    }

    /// Evaluate one binding right now, outside the tick loop.
    ///
    /// Returns `Ok(None)` when the binding is already in flight.
    pub async fn evaluate_once(&self, id: Uuid) -> DomainResult<Option<EvaluationOutcome>> {
        let binding = self
            .repo
            .get(id)
            .await?
            .ok_or(DomainError::BindingNotFound(id))?;

        let Some(_lease) = self.guard.try_acquire(binding.id) else {
            return Ok(None);
        };
        let outcome = self.evaluator.evaluate(&binding).await;
        self.stats.record(&outcome);
        Ok(Some(outcome))
    }

    /// Tick until `shutdown` flips to `true` (or its sender is dropped),
    /// then drain in-flight evaluations.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> SchedulerStatsSnapshot {
        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            max_concurrent_evaluations = self.config.max_concurrent_evaluations,
            handler_timeout_secs = self.config.handler_timeout_secs,
            delivery = ?self.config.delivery,
            "Binding scheduler started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Shutdown requested, draining in-flight evaluations");
        let drained = self.drain(self.config.shutdown_grace()).await;
        let stats = self.stats.snapshot();
        info!(
            drained,
            ticks = stats.ticks,
            delivered = stats.delivered,
            execute_failures = stats.execute_failures,
            "Binding scheduler stopped"
        );
        stats
    }

    /// Wait for in-flight evaluations, aborting whatever is still running
    /// after `grace`. Returns `true` if everything finished in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        let mut tasks = self.tasks.lock().await;

        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = tasks.join_next().await {
                self.reap(result);
            }
        })
        .await
        .is_ok();

        if !finished {
            warn!(remaining = tasks.len(), "Shutdown grace period elapsed, aborting evaluations");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
        finished
    }

    fn reap(&self, result: Result<(), JoinError>) {
        if let Err(e) = result {
            if e.is_panic() {
                bump(&self.stats.panics);
                error!(error = %e, "Evaluation task panicked");
            }
        }
    }
}
