//! Binding evaluator.
//!
//! Runs one binding through its action handler, persists the returned
//! state, and fires the reaction when the action triggered. Every failure
//! is contained and reported as an [`EvaluationOutcome`]; nothing here
//! returns an error to the scheduler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::DomainError;
use crate::domain::models::{Binding, DeliveryMode, EngineConfig};
use crate::domain::ports::{BindingRepository, CheckOutcome, HandlerContext, HandlerError};
use crate::services::handler_registry::HandlerRegistry;

/// How one evaluation ended.
#[derive(Debug)]
pub enum EvaluationOutcome {
    /// The action key is not registered. Nothing was called or persisted.
    ActionHandlerMissing,
    /// `check()` failed or timed out. State is unchanged.
    CheckFailed(HandlerError),
    /// The action did not trigger.
    NotTriggered,
    /// Writing the new action state failed, or the binding's parameters were
    /// updated while the check was running.
    StatePersistFailed(DomainError),
    /// The action triggered but the reaction key is not registered.
    ReactionHandlerMissing,
    /// The reaction ran successfully.
    Delivered,
    /// `execute()` failed or timed out.
    ExecuteFailed(HandlerError),
}

impl EvaluationOutcome {
    /// Stable snake_case name, used in logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ActionHandlerMissing => "action_handler_missing",
            Self::CheckFailed(_) => "check_failed",
            Self::NotTriggered => "not_triggered",
            Self::StatePersistFailed(_) => "state_persist_failed",
            Self::ReactionHandlerMissing => "reaction_handler_missing",
            Self::Delivered => "delivered",
            Self::ExecuteFailed(_) => "execute_failed",
        }
    }

    /// Anything other than `NotTriggered` or `Delivered`.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::NotTriggered | Self::Delivered)
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckFailed(e) | Self::ExecuteFailed(e) => write!(f, "{}: {e}", self.label()),
            Self::StatePersistFailed(e) => write!(f, "{}: {e}", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}

/// Drives a single binding through check, state persistence and reaction.
/// Shared between scheduler tasks behind an `Arc`.
pub struct Evaluator {
    registry: Arc<HandlerRegistry>,
    repo: Arc<dyn BindingRepository>,
    handler_timeout: Duration,
    delivery: DeliveryMode,
}

impl Evaluator {
    /// An evaluator with [`EngineConfig::default`] timeout and delivery mode.
    pub fn new(registry: Arc<HandlerRegistry>, repo: Arc<dyn BindingRepository>) -> Self {
        let defaults = EngineConfig::default();
        Self {
            registry,
            repo,
            handler_timeout: defaults.handler_timeout(),
            delivery: defaults.delivery,
        }
    }

    /// An evaluator using the timeout and delivery mode from `config`.
    pub fn from_config(
        registry: Arc<HandlerRegistry>,
        repo: Arc<dyn BindingRepository>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(registry, repo)
            .with_handler_timeout(config.handler_timeout())
            .with_delivery(config.delivery)
    }

    /// Upper bound on each `check()` and `execute()` call.
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// See [`DeliveryMode`].
    #[must_use]
    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    /// The handlers this evaluator dispatches to.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// The configured delivery mode.
    pub fn delivery(&self) -> DeliveryMode {
        self.delivery
    }

    /// Evaluate one binding.
    ///
    /// In [`DeliveryMode::AtMostOnce`] the new state is written before the
    /// reaction runs and is not rolled back if the reaction fails. In
    /// [`DeliveryMode::AtLeastOnce`] a triggered state is written only after
    /// the reaction succeeded.
    #[instrument(
        name = "evaluate",
        skip_all,
        fields(
            binding_id = %binding.id,
            user_id = %binding.user_id,
            action = %binding.action.key(),
            reaction = %binding.reaction.key(),
        )
    )]
    pub async fn evaluate(&self, binding: &Binding) -> EvaluationOutcome {
        let ctx = HandlerContext {
            user_id: binding.user_id,
            binding_id: binding.id,
        };

        let Some(action) = self.registry.lookup_action(&binding.action.key()) else {
            warn!("Action handler not registered, skipping binding");
            return EvaluationOutcome::ActionHandlerMissing;
        };

        let checked = self
            .call(action.check(
                &binding.action.parameters,
                binding.action.current_state.as_ref(),
                &ctx,
            ))
            .await;

        let CheckOutcome { triggered, new_state } = match checked {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Action check failed");
                return EvaluationOutcome::CheckFailed(e);
            }
        };

        if !triggered {
            if let Some(state) = &new_state {
                if let Err(e) = self.persist(binding, state).await {
                    return EvaluationOutcome::StatePersistFailed(e);
                }
            }
            debug!("Action not triggered");
            return EvaluationOutcome::NotTriggered;
        }

        match self.delivery {
            DeliveryMode::AtMostOnce => {
                if let Some(state) = &new_state {
                    if let Err(e) = self.persist(binding, state).await {
                        warn!("Reaction skipped because state could not be advanced");
                        return EvaluationOutcome::StatePersistFailed(e);
                    }
                }
                self.react(binding, &ctx).await
            }
            DeliveryMode::AtLeastOnce => {
                let outcome = self.react(binding, &ctx).await;
                if let (EvaluationOutcome::Delivered, Some(state)) = (&outcome, &new_state) {
                    if let Err(e) = self.persist(binding, state).await {
                        return EvaluationOutcome::StatePersistFailed(e);
                    }
                }
                outcome
            }
        }
    }

    async fn react(&self, binding: &Binding, ctx: &HandlerContext) -> EvaluationOutcome {
        let Some(reaction) = self.registry.lookup_reaction(&binding.reaction.key()) else {
            warn!("Reaction handler not registered, trigger dropped");
            return EvaluationOutcome::ReactionHandlerMissing;
        };

        match self.call(reaction.execute(&binding.reaction.parameters, ctx)).await {
            Ok(()) => {
                info!("Reaction delivered");
                EvaluationOutcome::Delivered
            }
            Err(e) => {
                error!(error = %e, delivery = ?self.delivery, "Reaction execute failed");
                EvaluationOutcome::ExecuteFailed(e)
            }
        }
    }

    /// Write `state` against the revision this evaluation started from.
    async fn persist(&self, binding: &Binding, state: &Value) -> Result<(), DomainError> {
        self.repo
            .save_action_state(binding.id, binding.action.revision, state)
            .await
            .inspect_err(|e| match e {
                DomainError::StaleActionState { .. } => {
                    warn!("Parameters changed during evaluation, discarding action state")
                }
                _ => error!(error = %e, "Failed to persist action state"),
            })
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, HandlerError>
    where
        F: Future<Output = Result<T, HandlerError>>,
    {
        tokio::time::timeout(self.handler_timeout, fut)
            .await
            .unwrap_or(Err(HandlerError::TimedOut(self.handler_timeout)))
    }
}
