//! Built-in action and reaction handlers.
//!
//! Each handler is constructed once with its dependencies and registered
//! under a fixed `{service}.{type}` key by [`register_builtin_handlers`].

pub mod discord;
pub mod github;
pub mod timer;
pub mod webhook;

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HandlerKey, HttpConfig};
use crate::domain::ports::{Clock, CredentialProvider, HandlerError, SystemClock};
use crate::services::handler_registry::HandlerRegistry;

pub use discord::DiscordSendMessage;
pub use github::{GithubNotificationFeed, NewNotificationAction, Notification, NotificationFeed};
pub use timer::CronTimerAction;
pub use webhook::WebhookPost;

/// Shared dependencies injected into built-in handlers.
#[derive(Clone)]
pub struct HandlerDeps {
    pub credentials: Arc<dyn CredentialProvider>,
    pub clock: Arc<dyn Clock>,
    pub http: reqwest::Client,
    pub github_api_base: String,
}

impl HandlerDeps {
    pub fn new(credentials: Arc<dyn CredentialProvider>, config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            credentials,
            clock: Arc::new(SystemClock),
            http,
            github_api_base: config.github_api_base.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Register every built-in handler.
pub fn register_builtin_handlers(registry: &mut HandlerRegistry, deps: &HandlerDeps) -> DomainResult<()> {
    registry.register_action(
        HandlerKey::new("timer", "cron"),
        timer::info(),
        Arc::new(CronTimerAction::new(Arc::clone(&deps.clock))),
    )?;

    let feed = GithubNotificationFeed::new(
        deps.http.clone(),
        deps.github_api_base.clone(),
        Arc::clone(&deps.credentials),
    );
    registry.register_action(
        HandlerKey::new("github", "new_notification"),
        github::info(),
        Arc::new(NewNotificationAction::new(Arc::new(feed))),
    )?;

    registry.register_reaction(
        HandlerKey::new("webhook", "post"),
        webhook::info(),
        Arc::new(WebhookPost::new(deps.http.clone())),
    )?;

    registry.register_reaction(
        HandlerKey::new("discord", "send_message"),
        discord::info(),
        Arc::new(DiscordSendMessage::new(deps.http.clone())),
    )?;

    Ok(())
}

/// Turn a non-2xx response into `HandlerError::Upstream`.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, HandlerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(HandlerError::Upstream(format!("{what} returned {status}: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credentials::StaticCredentialProvider;

    #[test]
    fn test_builtin_catalog() {
        let deps = HandlerDeps::new(Arc::new(StaticCredentialProvider::default()), &HttpConfig::default()).unwrap();
        let registry = HandlerRegistry::with_builtin_handlers(&deps).unwrap();

        let actions: Vec<_> = registry.list_actions().iter().map(|e| e.key().to_string()).collect();
        let reactions: Vec<_> = registry.list_reactions().iter().map(|e| e.key().to_string()).collect();
        assert_eq!(actions, vec!["github.new_notification", "timer.cron"]);
        assert_eq!(reactions, vec!["discord.send_message", "webhook.post"]);
    }

    #[test]
    fn test_registering_twice_fails() {
        let deps = HandlerDeps::new(Arc::new(StaticCredentialProvider::default()), &HttpConfig::default()).unwrap();
        let mut registry = HandlerRegistry::with_builtin_handlers(&deps).unwrap();
        assert!(register_builtin_handlers(&mut registry, &deps).is_err());
    }
}
