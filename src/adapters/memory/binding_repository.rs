//! In-memory binding repository.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Binding;
use crate::domain::ports::BindingRepository;

/// Binding store backed by a `Vec`, in insertion order.
///
/// `fail_state_writes` makes every `save_action_state` call fail, so tests
/// can drive the evaluator through persistence failures.
#[derive(Debug, Default)]
pub struct InMemoryBindingRepository {
    bindings: RwLock<Vec<Binding>>,
    fail_state_writes: AtomicBool,
    state_writes: AtomicUsize,
}

impl InMemoryBindingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `save_action_state` calls fail (or succeed again).
    pub fn set_fail_state_writes(&self, fail: bool) {
        self.fail_state_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `save_action_state` calls so far.
    pub fn state_write_count(&self) -> usize {
        self.state_writes.load(Ordering::SeqCst)
    }

    async fn update<F>(&self, id: Uuid, f: F) -> DomainResult<()>
    where
        F: FnOnce(&mut Binding),
    {
        let mut bindings = self.bindings.write().await;
        let binding = bindings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(DomainError::BindingNotFound(id))?;
        f(binding);
        Ok(())
    }
}

#[async_trait]
impl BindingRepository for InMemoryBindingRepository {
    async fn create(&self, binding: &Binding) -> DomainResult<()> {
        let mut bindings = self.bindings.write().await;
        if bindings.iter().any(|b| b.id == binding.id) {
            return Err(DomainError::DatabaseError(format!(
                "binding {} already exists",
                binding.id
            )));
        }
        bindings.push(binding.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Binding>> {
        let bindings = self.bindings.read().await;
        Ok(bindings.iter().find(|b| b.id == id).cloned())
    }

    async fn list(&self, user_id: Option<Uuid>) -> DomainResult<Vec<Binding>> {
        let bindings = self.bindings.read().await;
        Ok(bindings
            .iter()
            .filter(|b| user_id.map_or(true, |u| b.user_id == u))
            .cloned()
            .collect())
    }

    async fn list_active(&self) -> DomainResult<Vec<Binding>> {
        let bindings = self.bindings.read().await;
        Ok(bindings.iter().filter(|b| b.is_active).cloned().collect())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> DomainResult<()> {
        self.update(id, |b| {
            b.is_active = active;
            b.updated_at = Utc::now();
        })
        .await
    }

    async fn rename(&self, id: Uuid, name: &str) -> DomainResult<()> {
        self.update(id, |b| {
            b.name = name.to_string();
            b.updated_at = Utc::now();
        })
        .await
    }

    async fn update_parameters(
        &self,
        id: Uuid,
        action_parameters: &Value,
        reaction_parameters: &Value,
    ) -> DomainResult<()> {
        self.update(id, |b| {
            b.action.parameters = action_parameters.clone();
            b.action.current_state = None;
            b.action.revision += 1;
            b.reaction.parameters = reaction_parameters.clone();
            b.updated_at = Utc::now();
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let mut bindings = self.bindings.write().await;
        let before = bindings.len();
        bindings.retain(|b| b.id != id);
        if bindings.len() == before {
            return Err(DomainError::BindingNotFound(id));
        }
        Ok(())
    }

    async fn save_action_state(
        &self,
        binding_id: Uuid,
        expected_revision: i64,
        state: &Value,
    ) -> DomainResult<()> {
        if self.fail_state_writes.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError(
                "injected state write failure".to_string(),
            ));
        }
        let mut bindings = self.bindings.write().await;
        let binding = bindings
            .iter_mut()
            .find(|b| b.id == binding_id)
            .ok_or(DomainError::BindingNotFound(binding_id))?;
        if binding.action.revision != expected_revision {
            return Err(DomainError::StaleActionState {
                binding_id,
                expected_revision,
            });
        }
        binding.action.current_state = Some(state.clone());
        self.state_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ActionInstance, HandlerKey, ReactionInstance};
    use serde_json::json;

    fn binding(user_id: Uuid) -> Binding {
        Binding::new(
            user_id,
            "test",
            ActionInstance::new(&HandlerKey::new("timer", "cron"), json!({"cron": "* * * * *"})),
            ReactionInstance::new(&HandlerKey::new("webhook", "post"), json!({"url": "http://x"})),
        )
    }

    #[tokio::test]
    async fn test_list_active_skips_disabled() {
        let repo = InMemoryBindingRepository::new();
        let a = binding(Uuid::new_v4());
        let b = binding(Uuid::new_v4());
        repo.create(&a).await.unwrap();
        repo.create(&b).await.unwrap();
        repo.set_active(b.id, false).await.unwrap();

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);
    }

    #[tokio::test]
    async fn test_update_parameters_clears_state() {
        let repo = InMemoryBindingRepository::new();
        let b = binding(Uuid::new_v4());
        repo.create(&b).await.unwrap();
        repo.save_action_state(b.id, 0, &json!({"n": 1})).await.unwrap();

        repo.update_parameters(b.id, &json!({"cron": "0 * * * *"}), &json!({"url": "http://y"}))
            .await
            .unwrap();

        let stored = repo.get(b.id).await.unwrap().unwrap();
        assert!(stored.action.current_state.is_none());
        assert_eq!(stored.action.parameters["cron"], "0 * * * *");
        assert_eq!(stored.action.revision, 1);
    }

    #[tokio::test]
    async fn test_state_write_against_old_revision_is_rejected() {
        let repo = InMemoryBindingRepository::new();
        let b = binding(Uuid::new_v4());
        repo.create(&b).await.unwrap();
        repo.update_parameters(b.id, &json!({"cron": "0 * * * *"}), &json!({}))
            .await
            .unwrap();

        assert!(matches!(
            repo.save_action_state(b.id, 0, &json!({"n": 1})).await,
            Err(DomainError::StaleActionState { expected_revision: 0, .. })
        ));
        assert!(repo.get(b.id).await.unwrap().unwrap().action.current_state.is_none());

        repo.save_action_state(b.id, 1, &json!({"n": 1})).await.unwrap();
        assert_eq!(repo.state_write_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_state_write_failure() {
        let repo = InMemoryBindingRepository::new();
        let b = binding(Uuid::new_v4());
        repo.create(&b).await.unwrap();

        repo.set_fail_state_writes(true);
        assert!(repo.save_action_state(b.id, 0, &json!({})).await.is_err());
        assert_eq!(repo.state_write_count(), 0);

        repo.set_fail_state_writes(false);
        repo.save_action_state(b.id, 0, &json!({})).await.unwrap();
        assert_eq!(repo.state_write_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_binding_mutations() {
        let repo = InMemoryBindingRepository::new();
        let id = Uuid::new_v4();
        assert!(matches!(repo.rename(id, "x").await, Err(DomainError::BindingNotFound(_))));
        assert!(matches!(repo.delete(id).await, Err(DomainError::BindingNotFound(_))));
        assert!(matches!(
            repo.save_action_state(id, 0, &json!({})).await,
            Err(DomainError::BindingNotFound(_))
        ));
    }
}
