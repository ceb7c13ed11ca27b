//! `discord.send_message`: posts a message through a Discord webhook.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::models::{ParameterField, ParameterSchema};
use crate::domain::ports::{required_str, HandlerContext, HandlerError, ReactionHandler};
use crate::handlers::ensure_success;
use crate::services::handler_registry::HandlerInfo;

pub(crate) fn info() -> HandlerInfo {
    HandlerInfo::new("Discord message", "Sends a message to a Discord channel webhook").with_parameters(
        ParameterSchema::fields([
            (
                "webhook_url",
                ParameterField::string("Discord webhook URL")
                    .example("https://discord.com/api/webhooks/123/abc"),
            ),
            ("content", ParameterField::string("Message text")),
        ]),
    )
}

/// `discord.send_message`: posts `content` to a Discord webhook.
pub struct DiscordSendMessage {
    http: reqwest::Client,
}

impl DiscordSendMessage {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ReactionHandler for DiscordSendMessage {
    async fn execute(&self, parameters: &Value, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        let url = required_str(parameters, "webhook_url")?;
        let content = required_str(parameters, "content")?;

        let resp = self
            .http
            .post(url)
            .json(&json!({ "content": content }))
            .send()
            .await?;
        ensure_success(resp, "Discord webhook").await?;
        Ok(())
    }
}
