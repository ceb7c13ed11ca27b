//! Domain errors for the areaflow engine.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::HandlerKey;

/// Domain-level errors that can occur in the areaflow system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Binding not found: {0}")]
    BindingNotFound(Uuid),

    #[error("Unknown handler: {0}")]
    UnknownHandler(HandlerKey),

    #[error("Handler already registered: {0}")]
    DuplicateHandler(HandlerKey),

    /// The action's parameters changed while an evaluation was in flight.
    #[error("Stale action state for binding {binding_id}: expected revision {expected_revision}, but parameters were updated")]
    StaleActionState { binding_id: Uuid, expected_revision: i64 },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
