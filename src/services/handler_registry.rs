//! Handler Registry
//!
//! Static lookup from a `{service}.{type}` key to a handler instance plus
//! its catalog metadata. Handlers are registered explicitly once at
//! startup and never change afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{HandlerKey, ParameterSchema};
use crate::domain::ports::{ActionHandler, ReactionHandler};
use crate::handlers::{register_builtin_handlers, HandlerDeps};

/// Human-facing metadata for one handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerInfo {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl HandlerInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::default(),
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }
}

struct Entry<H: ?Sized> {
    handler: Arc<H>,
    info: HandlerInfo,
}

/// One row of the public catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub service: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl CatalogEntry {
    fn new(key: &HandlerKey, info: &HandlerInfo) -> Self {
        Self {
            service: key.service().to_string(),
            kind: key.kind().to_string(),
            name: info.name.clone(),
            description: info.description.clone(),
            parameters: info.parameters.clone(),
        }
    }

    pub fn key(&self) -> HandlerKey {
        HandlerKey::new(&self.service, &self.kind)
    }
}

/// Registry of action and reaction handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    actions: HashMap<HandlerKey, Entry<dyn ActionHandler>>,
    reactions: HashMap<HandlerKey, Entry<dyn ReactionHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in handler.
    pub fn with_builtin_handlers(deps: &HandlerDeps) -> DomainResult<Self> {
        let mut registry = Self::new();
        register_builtin_handlers(&mut registry, deps)?;
        Ok(registry)
    }

    /// Register an action handler. Keys must be unique.
    pub fn register_action(
        &mut self,
        key: HandlerKey,
        info: HandlerInfo,
        handler: Arc<dyn ActionHandler>,
    ) -> DomainResult<()> {
        if self.actions.contains_key(&key) {
            return Err(DomainError::DuplicateHandler(key));
        }
        debug!(key = %key, "Registering action handler");
        self.actions.insert(key, Entry { handler, info });
        Ok(())
    }

    /// Register a reaction handler. Keys must be unique.
    pub fn register_reaction(
        &mut self,
        key: HandlerKey,
        info: HandlerInfo,
        handler: Arc<dyn ReactionHandler>,
    ) -> DomainResult<()> {
        if self.reactions.contains_key(&key) {
            return Err(DomainError::DuplicateHandler(key));
        }
        debug!(key = %key, "Registering reaction handler");
        self.reactions.insert(key, Entry { handler, info });
        Ok(())
    }

    pub fn lookup_action(&self, key: &HandlerKey) -> Option<Arc<dyn ActionHandler>> {
        self.actions.get(key).map(|e| Arc::clone(&e.handler))
    }

    pub fn lookup_reaction(&self, key: &HandlerKey) -> Option<Arc<dyn ReactionHandler>> {
        self.reactions.get(key).map(|e| Arc::clone(&e.handler))
    }

    pub fn action_schema(&self, key: &HandlerKey) -> Option<&ParameterSchema> {
        self.actions.get(key).map(|e| &e.info.parameters)
    }

    pub fn reaction_schema(&self, key: &HandlerKey) -> Option<&ParameterSchema> {
        self.reactions.get(key).map(|e| &e.info.parameters)
    }

    /// Catalog of actions, sorted by key.
    pub fn list_actions(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<_> = self
            .actions
            .iter()
            .map(|(key, e)| CatalogEntry::new(key, &e.info))
            .collect();
        entries.sort_by_key(CatalogEntry::key);
        entries
    }

    /// Catalog of reactions, sorted by key.
    pub fn list_reactions(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<_> = self
            .reactions
            .iter()
            .map(|(key, e)| CatalogEntry::new(key, &e.info))
            .collect();
        entries.sort_by_key(CatalogEntry::key);
        entries
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<_> = self.actions.keys().map(ToString::to_string).collect();
        let mut reactions: Vec<_> = self.reactions.keys().map(ToString::to_string).collect();
        actions.sort();
        reactions.sort();
        f.debug_struct("HandlerRegistry")
            .field("actions", &actions)
            .field("reactions", &reactions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ParameterField;
    use crate::domain::ports::{CheckOutcome, HandlerContext, HandlerError};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Never;

    #[async_trait]
    impl ActionHandler for Never {
        async fn check(
            &self,
            _parameters: &Value,
            _current_state: Option<&Value>,
            _ctx: &HandlerContext,
        ) -> Result<CheckOutcome, HandlerError> {
            Ok(CheckOutcome::idle())
        }
    }

    struct Noop;

    #[async_trait]
    impl ReactionHandler for Noop {
        async fn execute(&self, _parameters: &Value, _ctx: &HandlerContext) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        let key = HandlerKey::new("test", "never");
        registry
            .register_action(key.clone(), HandlerInfo::new("Never", "never fires"), Arc::new(Never))
            .unwrap();

        assert!(registry.lookup_action(&key).is_some());
        assert!(registry.lookup_reaction(&key).is_none());
        assert!(registry.lookup_action(&HandlerKey::new("test", "missing")).is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut registry = HandlerRegistry::new();
        let key = HandlerKey::new("test", "noop");
        registry
            .register_reaction(key.clone(), HandlerInfo::new("Noop", ""), Arc::new(Noop))
            .unwrap();
        let err = registry
            .register_reaction(key.clone(), HandlerInfo::new("Noop", ""), Arc::new(Noop))
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateHandler(k) if k == key));
    }

    #[test]
    fn test_same_key_allowed_across_capabilities() {
        let mut registry = HandlerRegistry::new();
        let key = HandlerKey::new("test", "both");
        registry
            .register_action(key.clone(), HandlerInfo::new("A", ""), Arc::new(Never))
            .unwrap();
        registry
            .register_reaction(key, HandlerInfo::new("R", ""), Arc::new(Noop))
            .unwrap();
    }

    #[test]
    fn test_catalog_is_sorted_and_carries_schema() {
        let mut registry = HandlerRegistry::new();
        let schema = ParameterSchema::fields([("url", ParameterField::string("Target URL"))]);
        registry
            .register_reaction(
                HandlerKey::new("zeta", "post"),
                HandlerInfo::new("Z", "z").with_parameters(schema.clone()),
                Arc::new(Noop),
            )
            .unwrap();
        registry
            .register_reaction(HandlerKey::new("alpha", "post"), HandlerInfo::new("A", "a"), Arc::new(Noop))
            .unwrap();

        let catalog = registry.list_reactions();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].service, "alpha");
        assert_eq!(catalog[1].parameters, schema);

        let json = serde_json::to_value(&catalog[1]).unwrap();
        assert_eq!(json["type"], "post");
        assert_eq!(json["parameters"]["url"]["type"], "string");
    }
}
