//! Binding service: CRUD with creation-time parameter validation.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionInstance, Binding, NewBinding, ParameterSchema, ReactionInstance};
use crate::domain::ports::BindingRepository;
use crate::services::handler_registry::HandlerRegistry;

pub struct BindingService<R: BindingRepository> {
    repository: Arc<R>,
    registry: Arc<HandlerRegistry>,
}

impl<R: BindingRepository> BindingService<R> {
    pub fn new(repository: Arc<R>, registry: Arc<HandlerRegistry>) -> Self {
        Self { repository, registry }
    }

    /// Create a binding after checking both handlers exist and both
    /// parameter maps satisfy their schemas.
    ///
    /// The binding starts active with no action state.
    pub async fn create(&self, request: NewBinding) -> DomainResult<Binding> {
        let action_schema = self
            .registry
            .action_schema(&request.action)
            .ok_or_else(|| DomainError::UnknownHandler(request.action.clone()))?;
        let reaction_schema = self
            .registry
            .reaction_schema(&request.reaction)
            .ok_or_else(|| DomainError::UnknownHandler(request.reaction.clone()))?;

        let name = request.name.trim();
        let mut problems = Vec::new();
        if name.is_empty() {
            problems.push("name must not be empty".to_string());
        }
        collect_problems(&mut problems, "action", action_schema, &request.action_parameters);
        collect_problems(&mut problems, "reaction", reaction_schema, &request.reaction_parameters);
        if !problems.is_empty() {
            return Err(DomainError::ValidationFailed(problems.join("; ")));
        }

        let binding = Binding::new(
            request.user_id,
            name,
            ActionInstance::new(&request.action, normalize(request.action_parameters)),
            ReactionInstance::new(&request.reaction, normalize(request.reaction_parameters)),
        );
        self.repository.create(&binding).await?;

        info!(
            binding_id = %binding.id,
            user_id = %binding.user_id,
            action = %request.action,
            reaction = %request.reaction,
            "Binding created"
        );
        Ok(binding)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Option<Binding>> {
        self.repository.get(id).await
    }

    pub async fn list(&self, user_id: Option<Uuid>) -> DomainResult<Vec<Binding>> {
        self.repository.list(user_id).await
    }

    pub async fn enable(&self, id: Uuid) -> DomainResult<()> {
        self.repository.set_active(id, true).await
    }

    pub async fn disable(&self, id: Uuid) -> DomainResult<()> {
        self.repository.set_active(id, false).await
    }

    pub async fn rename(&self, id: Uuid, name: &str) -> DomainResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationFailed("name must not be empty".to_string()));
        }
        self.repository.rename(id, name).await
    }

    /// Replace parameters, re-validating them. Resets the action state.
    pub async fn update_parameters(
        &self,
        id: Uuid,
        action_parameters: Value,
        reaction_parameters: Value,
    ) -> DomainResult<()> {
        let binding = self
            .repository
            .get(id)
            .await?
            .ok_or(DomainError::BindingNotFound(id))?;

        let action_key = binding.action.key();
        let reaction_key = binding.reaction.key();
        let action_schema = self
            .registry
            .action_schema(&action_key)
            .ok_or(DomainError::UnknownHandler(action_key))?;
        let reaction_schema = self
            .registry
            .reaction_schema(&reaction_key)
            .ok_or(DomainError::UnknownHandler(reaction_key))?;

        let mut problems = Vec::new();
        collect_problems(&mut problems, "action", action_schema, &action_parameters);
        collect_problems(&mut problems, "reaction", reaction_schema, &reaction_parameters);
        if !problems.is_empty() {
            return Err(DomainError::ValidationFailed(problems.join("; ")));
        }

        self.repository
            .update_parameters(id, &normalize(action_parameters), &normalize(reaction_parameters))
            .await
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.repository.delete(id).await
    }
}

fn collect_problems(problems: &mut Vec<String>, side: &str, schema: &ParameterSchema, parameters: &Value) {
    if let Err(e) = schema.validate(parameters) {
        problems.push(format!("{side} parameters: {e}"));
    }
}

/// Store `null` parameter maps as `{}`.
fn normalize(parameters: Value) -> Value {
    if parameters.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        parameters
    }
}
