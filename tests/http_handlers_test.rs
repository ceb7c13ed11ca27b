//! HTTP-backed handlers against a local mock server.

mod common;

use std::sync::Arc;

use mockito::Matcher;
use serde_json::json;
use uuid::Uuid;

use areaflow::domain::ports::{
    ActionHandler, CredentialProvider, HandlerContext, HandlerError, ReactionHandler,
};
use areaflow::handlers::{
    DiscordSendMessage, GithubNotificationFeed, NewNotificationAction, NotificationFeed, WebhookPost,
};
use areaflow::infrastructure::credentials::StaticCredentialProvider;

fn ctx(user_id: Uuid) -> HandlerContext {
    HandlerContext {
        user_id,
        binding_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn test_webhook_posts_body_with_content_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_body(r#"{"ok":true}"#)
        .with_status(204)
        .create_async()
        .await;

    let handler = WebhookPost::new(reqwest::Client::new());
    let params = json!({
        "url": format!("{}/hook", server.url()),
        "body": r#"{"ok":true}"#,
        "content_type": "application/json",
    });
    handler.execute(&params, &ctx(Uuid::new_v4())).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_webhook_defaults_to_empty_text_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "text/plain; charset=utf-8")
        .match_body("")
        .with_status(200)
        .create_async()
        .await;

    let handler = WebhookPost::new(reqwest::Client::new());
    let params = json!({ "url": format!("{}/hook", server.url()) });
    handler.execute(&params, &ctx(Uuid::new_v4())).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_webhook_non_success_is_upstream_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/hook")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let handler = WebhookPost::new(reqwest::Client::new());
    let params = json!({ "url": format!("{}/hook", server.url()) });
    let err = handler.execute(&params, &ctx(Uuid::new_v4())).await.unwrap_err();

    match err {
        HandlerError::Upstream(msg) => {
            assert!(msg.contains("500"), "{msg}");
            assert!(msg.contains("boom"), "{msg}");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_webhook_missing_url_is_invalid_parameters() {
    let handler = WebhookPost::new(reqwest::Client::new());
    let err = handler.execute(&json!({}), &ctx(Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, HandlerError::InvalidParameters(_)));
}

#[tokio::test]
async fn test_discord_sends_json_content() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/webhooks/1/abc")
        .match_body(Matcher::Json(json!({ "content": "deploy finished" })))
        .with_status(204)
        .create_async()
        .await;

    let handler = DiscordSendMessage::new(reqwest::Client::new());
    let params = json!({
        "webhook_url": format!("{}/api/webhooks/1/abc", server.url()),
        "content": "deploy finished",
    });
    handler.execute(&params, &ctx(Uuid::new_v4())).await.unwrap();

    mock.assert_async().await;
}

const GITHUB_PAYLOAD: &str = r#"[
  {
    "id": "100",
    "reason": "mention",
    "updated_at": "2024-06-01T10:00:00Z",
    "subject": { "title": "Fix the build", "type": "PullRequest" },
    "repository": { "full_name": "octo/repo", "private": false }
  }
]"#;

fn github_feed(server: &mockito::Server, user: Uuid) -> GithubNotificationFeed {
    let credentials: Arc<dyn CredentialProvider> =
        Arc::new(StaticCredentialProvider::new().with_token(user, "github", "gh-token"));
    GithubNotificationFeed::new(reqwest::Client::new(), server.url(), credentials)
}

#[tokio::test]
async fn test_github_feed_sends_token_and_parses_notifications() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/notifications")
        .match_query(Matcher::UrlEncoded("all".into(), "true".into()))
        .match_header("authorization", "Bearer gh-token")
        .match_header("accept", "application/vnd.github+json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(GITHUB_PAYLOAD)
        .create_async()
        .await;

    let user = Uuid::new_v4();
    let items = github_feed(&server, user).notifications(&ctx(user), None).await.unwrap();

    mock.assert_async().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "100");
    assert_eq!(items[0].title, "Fix the build");
    assert_eq!(items[0].repository, "octo/repo");
}

#[tokio::test]
async fn test_github_feed_scopes_to_repository() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octo/repo/notifications")
        .match_query(Matcher::UrlEncoded("all".into(), "true".into()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let user = Uuid::new_v4();
    let items = github_feed(&server, user)
        .notifications(&ctx(user), Some("octo/repo"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_github_feed_rejects_malformed_repository() {
    let server = mockito::Server::new_async().await;
    let user = Uuid::new_v4();
    let err = github_feed(&server, user)
        .notifications(&ctx(user), Some("not-a-repo"))
        .await
        .unwrap_err();
    assert!(matches!(err, HandlerError::InvalidParameters(_)));
}

#[tokio::test]
async fn test_github_feed_without_credentials() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;

    let feed = github_feed(&server, Uuid::new_v4());
    let stranger = Uuid::new_v4();
    let err = feed.notifications(&ctx(stranger), None).await.unwrap_err();

    assert!(matches!(err, HandlerError::MissingCredentials { .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_new_notification_action_over_http_sets_baseline() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/notifications")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(GITHUB_PAYLOAD)
        .create_async()
        .await;

    let user = Uuid::new_v4();
    let action = NewNotificationAction::new(Arc::new(github_feed(&server, user)));
    let outcome = action.check(&json!({}), None, &ctx(user)).await.unwrap();

    assert!(!outcome.triggered);
    assert_eq!(outcome.new_state, Some(json!({ "lastSeenAt": "2024-06-01T10:00:00Z" })));
}
