//! `webhook.post`: POSTs a body to an arbitrary URL.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::models::{ParameterField, ParameterSchema};
use crate::domain::ports::{optional_str, required_str, HandlerContext, HandlerError, ReactionHandler};
use crate::handlers::ensure_success;
use crate::services::handler_registry::HandlerInfo;

const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub(crate) fn info() -> HandlerInfo {
    HandlerInfo::new("Webhook", "Sends an HTTP POST request").with_parameters(ParameterSchema::fields([
        ("url", ParameterField::string("Target URL").example("https://example.com/hook")),
        ("body", ParameterField::string("Request body").optional()),
        (
            "content_type",
            ParameterField::string("Content-Type header")
                .optional()
                .example("application/json"),
        ),
    ]))
}

/// `webhook.post`: POSTs a body to an arbitrary URL.
pub struct WebhookPost {
    http: reqwest::Client,
}

impl WebhookPost {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ReactionHandler for WebhookPost {
    async fn execute(&self, parameters: &Value, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        let url = required_str(parameters, "url")?;
        let body = optional_str(parameters, "body").unwrap_or_default().to_string();
        let content_type = optional_str(parameters, "content_type").unwrap_or(DEFAULT_CONTENT_TYPE);

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        ensure_success(resp, "Webhook").await?;
        Ok(())
    }
}
