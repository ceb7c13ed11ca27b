//! Credential resolution port.
//!
//! Handlers ask for a user's access token on a given provider. Issuing and
//! refreshing tokens is the job of the external token service behind this
//! trait.

use async_trait::async_trait;
use uuid::Uuid;

use super::handler::HandlerError;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve a valid access token for `user_id` on `provider`.
    async fn access_token(&self, user_id: Uuid, provider: &str) -> Result<String, HandlerError>;
}
