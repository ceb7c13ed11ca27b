//! Handler contract
//!
//! Every action and reaction implementation sits behind one of these two
//! traits. The engine never interprets parameters or action state; it only
//! moves them between persistence and the handler.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Per-call context handed to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerContext {
    /// Owner of the binding; used to resolve upstream credentials.
    pub user_id: Uuid,
    /// Binding being evaluated, for diagnostics.
    pub binding_id: Uuid,
}

/// Result of an action check.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckOutcome {
    /// Whether the reaction should fire.
    pub triggered: bool,
    /// Replacement action state. `None` keeps the stored state untouched.
    pub new_state: Option<Value>,
}

impl CheckOutcome {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn baseline(state: Value) -> Self {
        Self {
            triggered: false,
            new_state: Some(state),
        }
    }

    pub fn fire(state: Value) -> Self {
        Self {
            triggered: true,
            new_state: Some(state),
        }
    }
}

/// Errors raised by handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("No {provider} credentials for user {user_id}")]
    MissingCredentials { provider: String, user_id: Uuid },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Handler call timed out after {0:?}")]
    TimedOut(Duration),
}

/// A trigger condition evaluated on every tick.
///
/// `current_state` is `None` on the first evaluation. Implementations must
/// tolerate partial or unexpected state; the engine does not validate it.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn check(
        &self,
        parameters: &Value,
        current_state: Option<&Value>,
        ctx: &HandlerContext,
    ) -> Result<CheckOutcome, HandlerError>;
}

/// A side effect run when an action triggers.
#[async_trait]
pub trait ReactionHandler: Send + Sync {
    async fn execute(&self, parameters: &Value, ctx: &HandlerContext) -> Result<(), HandlerError>;
}

/// Read a required string parameter.
pub fn required_str<'a>(parameters: &'a Value, name: &str) -> Result<&'a str, HandlerError> {
    match parameters.get(name).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(HandlerError::InvalidParameters(format!(
            "'{name}' must be a non-empty string"
        ))),
    }
}

/// Read an optional string parameter; empty strings count as absent.
pub fn optional_str<'a>(parameters: &'a Value, name: &str) -> Option<&'a str> {
    parameters
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
