//! Credential resolution backed by configuration.
//!
//! Stands in for the external token service: tokens are read from the
//! `credentials` section of the configuration and never refreshed.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::CredentialEntry;
use crate::domain::ports::{CredentialProvider, HandlerError};

/// Serves fixed per-user tokens keyed by `(user_id, provider)`.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    tokens: HashMap<(Uuid, String), String>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from config entries. Later entries win on duplicate keys.
    pub fn from_entries(entries: &[CredentialEntry]) -> Self {
        let mut provider = Self::new();
        for entry in entries {
            provider.insert(entry.user_id, &entry.provider, &entry.access_token);
        }
        provider
    }

    pub fn insert(&mut self, user_id: Uuid, provider: &str, token: &str) {
        self.tokens
            .insert((user_id, provider.to_string()), token.to_string());
    }

    #[must_use]
    pub fn with_token(mut self, user_id: Uuid, provider: &str, token: &str) -> Self {
        self.insert(user_id, provider, token);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn access_token(&self, user_id: Uuid, provider: &str) -> Result<String, HandlerError> {
        self.tokens
            .get(&(user_id, provider.to_string()))
            .cloned()
            .ok_or_else(|| HandlerError::MissingCredentials {
                provider: provider.to_string(),
                user_id,
            })
    }
}
