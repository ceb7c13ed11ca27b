//! Repository port for bindings.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Binding;

/// Repository for persisting and querying bindings together with their
/// action and reaction instances.
#[async_trait]
pub trait BindingRepository: Send + Sync {
    /// Create a new binding.
    async fn create(&self, binding: &Binding) -> DomainResult<()>;

    /// Get a binding by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Binding>>;

    /// List bindings, optionally restricted to one user.
    async fn list(&self, user_id: Option<Uuid>) -> DomainResult<Vec<Binding>>;

    /// List bindings with `is_active = true`, action and reaction loaded.
    async fn list_active(&self) -> DomainResult<Vec<Binding>>;

    /// Activate or deactivate a binding.
    async fn set_active(&self, id: Uuid, active: bool) -> DomainResult<()>;

    /// Rename a binding.
    async fn rename(&self, id: Uuid, name: &str) -> DomainResult<()>;

    /// Replace action and reaction parameters. Clears the action state and
    /// bumps the action revision.
    async fn update_parameters(
        &self,
        id: Uuid,
        action_parameters: &Value,
        reaction_parameters: &Value,
    ) -> DomainResult<()>;

    /// Delete a binding.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// Overwrite the action state of a binding, provided its action is still
    /// at `expected_revision`. Fails with `StaleActionState` otherwise, so a
    /// check that started before a parameter update cannot resurrect state
    /// the update cleared.
    ///
    /// Reserved for the evaluator: nothing else writes action state.
    async fn save_action_state(
        &self,
        binding_id: Uuid,
        expected_revision: i64,
        state: &Value,
    ) -> DomainResult<()>;
}
