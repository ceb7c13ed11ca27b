//! `github.new_notification`: fires when the user receives GitHub
//! notifications newer than the last ones seen.
//!
//! State is `{"lastSeenAt": <rfc3339 | null>}`. The first evaluation only
//! records a baseline, so notifications that already exist never fire.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::models::{ParameterField, ParameterSchema};
use crate::domain::ports::{
    optional_str, ActionHandler, CheckOutcome, CredentialProvider, HandlerContext, HandlerError,
};
use crate::handlers::ensure_success;
use crate::services::handler_registry::HandlerInfo;

pub(crate) fn info() -> HandlerInfo {
    HandlerInfo::new("New GitHub notification", "Triggers when a new GitHub notification arrives")
        .with_parameters(ParameterSchema::fields([(
            "repository",
            ParameterField::string("Only watch this repository (owner/name)")
                .optional()
                .example("rust-lang/rust"),
        )]))
}

/// A notification as seen by the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Thread id assigned by the provider.
    pub id: String,
    /// Last activity on the thread; the action's cursor advances on this.
    pub updated_at: DateTime<Utc>,
    /// Why the user was notified (`mention`, `review_requested`, ...).
    pub reason: String,
    /// Subject title.
    pub title: String,
    /// `owner/name` of the repository.
    pub repository: String,
}

/// Source of a user's notifications.
#[async_trait]
pub trait NotificationFeed: Send + Sync {
    /// Fetch the user's notifications, optionally for one `owner/name`
    /// repository.
    async fn notifications(
        &self,
        ctx: &HandlerContext,
        repository: Option<&str>,
    ) -> Result<Vec<Notification>, HandlerError>;
}

#[derive(Debug, Deserialize)]
struct ApiNotification {
    id: String,
    reason: String,
    updated_at: DateTime<Utc>,
    subject: ApiSubject,
    repository: ApiRepository,
}

#[derive(Debug, Deserialize)]
struct ApiSubject {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    full_name: String,
}

impl From<ApiNotification> for Notification {
    fn from(n: ApiNotification) -> Self {
        Self {
            id: n.id,
            updated_at: n.updated_at,
            reason: n.reason,
            title: n.subject.title,
            repository: n.repository.full_name,
        }
    }
}

/// GitHub REST implementation of [`NotificationFeed`].
pub struct GithubNotificationFeed {
    http: reqwest::Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl GithubNotificationFeed {
    /// Credential provider name the token is looked up under.
    pub const PROVIDER: &'static str = "github";

    pub fn new(http: reqwest::Client, api_base: String, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http,
            api_base,
            credentials,
        }
    }

    fn url(&self, repository: Option<&str>) -> Result<String, HandlerError> {
        match repository {
            None => Ok(format!("{}/notifications?all=true", self.api_base)),
            Some(repo) => match repo.split_once('/') {
                Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(
                    format!("{}/repos/{owner}/{name}/notifications?all=true", self.api_base),
                ),
                _ => Err(HandlerError::InvalidParameters(format!(
                    "'repository' must look like owner/name, got '{repo}'"
                ))),
            },
        }
    }
}

#[async_trait]
impl NotificationFeed for GithubNotificationFeed {
    async fn notifications(
        &self,
        ctx: &HandlerContext,
        repository: Option<&str>,
    ) -> Result<Vec<Notification>, HandlerError> {
        let url = self.url(repository)?;
        let token = self.credentials.access_token(ctx.user_id, Self::PROVIDER).await?;

        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;
        let resp = ensure_success(resp, "GitHub notifications").await?;

        let items: Vec<ApiNotification> = resp.json().await?;
        Ok(items.into_iter().map(Notification::from).collect())
    }
}

/// `github.new_notification`: fires once per poll that sees a notification
/// newer than the stored cursor.
pub struct NewNotificationAction {
    feed: Arc<dyn NotificationFeed>,
}

impl NewNotificationAction {
    pub fn new(feed: Arc<dyn NotificationFeed>) -> Self {
        Self { feed }
    }
}

/// Where the previous evaluation left off.
enum Cursor {
    /// No usable state: record a baseline.
    Fresh,
    /// Everything strictly newer than this is new. `None` means the inbox
    /// was empty at baseline time.
    Since(Option<DateTime<Utc>>),
}

fn cursor(state: Option<&Value>) -> Cursor {
    let Some(state) = state else {
        return Cursor::Fresh;
    };
    match state.get("lastSeenAt") {
        Some(Value::Null) => Cursor::Since(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Cursor::Since(Some(dt.with_timezone(&Utc))))
            .unwrap_or(Cursor::Fresh),
        _ => Cursor::Fresh,
    }
}

/// Lossless: the cursor is compared at full precision.
fn timestamp(t: Option<DateTime<Utc>>) -> Value {
    t.map_or(Value::Null, |t| Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
}

#[async_trait]
impl ActionHandler for NewNotificationAction {
    async fn check(
        &self,
        parameters: &Value,
        current_state: Option<&Value>,
        ctx: &HandlerContext,
    ) -> Result<CheckOutcome, HandlerError> {
        let repository = optional_str(parameters, "repository");
        let items = self.feed.notifications(ctx, repository).await?;

        let since = match cursor(current_state) {
            Cursor::Fresh => {
                let newest = items.iter().map(|n| n.updated_at).max();
                debug!(count = items.len(), "Recording notification baseline");
                return Ok(CheckOutcome::baseline(json!({ "lastSeenAt": timestamp(newest) })));
            }
            Cursor::Since(since) => since,
        };

        let mut fresh: Vec<Notification> = items
            .into_iter()
            .filter(|n| since.map_or(true, |s| n.updated_at > s))
            .collect();
        if fresh.is_empty() {
            return Ok(CheckOutcome::idle());
        }
        fresh.sort_by_key(|n| n.updated_at);

        let newest = fresh.last().map(|n| n.updated_at);
        Ok(CheckOutcome::fire(json!({
            "lastSeenAt": timestamp(newest),
            "notifications": fresh,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct ScriptedFeed(Mutex<Vec<Notification>>);

    impl ScriptedFeed {
        fn set(&self, items: Vec<Notification>) {
            *self.0.lock().unwrap() = items;
        }
    }

    #[async_trait]
    impl NotificationFeed for ScriptedFeed {
        async fn notifications(
            &self,
            _ctx: &HandlerContext,
            _repository: Option<&str>,
        ) -> Result<Vec<Notification>, HandlerError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    fn note(id: &str, minute: u32) -> Notification {
        Notification {
            id: id.to_string(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            reason: "mention".to_string(),
            title: format!("issue {id}"),
            repository: "octo/repo".to_string(),
        }
    }

    fn ctx() -> HandlerContext {
        HandlerContext {
            user_id: Uuid::new_v4(),
            binding_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_baseline_then_fire_on_newer() {
        let feed = Arc::new(ScriptedFeed::default());
        feed.set(vec![note("1", 0)]);
        let action = NewNotificationAction::new(feed.clone());
        let params = json!({});

        let first = action.check(&params, None, &ctx()).await.unwrap();
        assert!(!first.triggered);
        let state = first.new_state.unwrap();
        assert_eq!(state, json!({"lastSeenAt": "2024-05-01T12:00:00Z"}));

        feed.set(vec![note("1", 0), note("3", 10), note("2", 5)]);
        let second = action.check(&params, Some(&state), &ctx()).await.unwrap();
        assert!(second.triggered);
        let new_state = second.new_state.unwrap();
        assert_eq!(new_state["lastSeenAt"], "2024-05-01T12:10:00Z");
        let ids: Vec<_> = new_state["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["2", "3"]);

        let third = action.check(&params, Some(&new_state), &ctx()).await.unwrap();
        assert_eq!(third, CheckOutcome::idle());
    }

    #[tokio::test]
    async fn test_empty_baseline_fires_on_first_notification() {
        let feed = Arc::new(ScriptedFeed::default());
        let action = NewNotificationAction::new(feed.clone());

        let first = action.check(&json!({}), None, &ctx()).await.unwrap();
        let state = first.new_state.unwrap();
        assert_eq!(state, json!({"lastSeenAt": null}));

        feed.set(vec![note("1", 0)]);
        let second = action.check(&json!({}), Some(&state), &ctx()).await.unwrap();
        assert!(second.triggered);
    }

    #[tokio::test]
    async fn test_unparseable_cursor_rebaselines() {
        let feed = Arc::new(ScriptedFeed::default());
        feed.set(vec![note("1", 0)]);
        let action = NewNotificationAction::new(feed);

        let out = action
            .check(&json!({}), Some(&json!({"lastSeenAt": "yesterday"})), &ctx())
            .await
            .unwrap();
        assert!(!out.triggered);
        assert_eq!(out.new_state, Some(json!({"lastSeenAt": "2024-05-01T12:00:00Z"})));
    }

    #[tokio::test]
    async fn test_sub_second_timestamps_do_not_refire() {
        let mut item = note("1", 0);
        item.updated_at += chrono::Duration::milliseconds(500);
        let feed = Arc::new(ScriptedFeed::default());
        feed.set(vec![item.clone()]);
        let action = NewNotificationAction::new(feed.clone());
        let params = json!({});

        let baseline = action.check(&params, None, &ctx()).await.unwrap();
        let state = baseline.new_state.unwrap();
        assert_eq!(state, json!({"lastSeenAt": "2024-05-01T12:00:00.500Z"}));

        let replay = action.check(&params, Some(&state), &ctx()).await.unwrap();
        assert_eq!(replay, CheckOutcome::idle());

        let mut later = note("2", 0);
        later.updated_at += chrono::Duration::milliseconds(501);
        feed.set(vec![item, later]);
        let fired = action.check(&params, Some(&state), &ctx()).await.unwrap();
        assert!(fired.triggered);
        assert_eq!(fired.new_state.unwrap()["lastSeenAt"], "2024-05-01T12:00:00.501Z");
    }

    #[test]
    fn test_repository_url() {
        let feed = GithubNotificationFeed::new(
            reqwest::Client::new(),
            "https://api.github.com".to_string(),
            Arc::new(crate::infrastructure::credentials::StaticCredentialProvider::default()),
        );
        assert_eq!(
            feed.url(Some("octo/repo")).unwrap(),
            "https://api.github.com/repos/octo/repo/notifications?all=true"
        );
        assert_eq!(feed.url(None).unwrap(), "https://api.github.com/notifications?all=true");
        assert!(feed.url(Some("nope")).is_err());
        assert!(feed.url(Some("a/b/c")).is_err());
    }
}
