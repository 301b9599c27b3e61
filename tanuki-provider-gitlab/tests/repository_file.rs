mod common;

use std::time::Duration;

use serde_json::json;
use tanuki_core::context::OperationContext;
use tanuki_core::provider::Provider;
use tanuki_core::resource::{Resource, Value};
use tanuki_provider_gitlab::http::HttpMethod;

use common::FakeGitLab;

const FILES: &str = "/projects/42/repository/files/docs%2FREADME.md";

fn readme() -> Resource {
    Resource::new("gitlab_repository_file", "readme")
        .with_attribute("project", "42")
        .with_attribute("branch", "main")
        .with_attribute("file_path", "docs/README.md")
        .with_attribute("content", "hello world")
        .with_attribute("commit_message", "add readme")
}

fn refresh() -> serde_json::Value {
    json!({"message": "You are attempting to update a file that has changed since you started editing it. Please refresh and try again"})
}

#[tokio::test]
async fn create_keeps_plain_content_in_state() {
    let gitlab = FakeGitLab::new();
    let provider = gitlab.provider();
    let ctx = OperationContext::new();

    let state = provider.create(&ctx, &readme()).await.unwrap();
    assert_eq!(state.identifier.as_deref(), Some("42:main:docs/README.md"));
    assert_eq!(state.attributes.get("content"), Some(&Value::from("hello world")));
    assert_eq!(state.attributes.get("encoding"), Some(&Value::from("base64")));
    assert_eq!(
        gitlab.object("file/42/main/docs/README.md").unwrap()["content"],
        json!("aGVsbG8gd29ybGQ=")
    );
}

#[tokio::test]
async fn create_retries_refresh_conflicts() {
    let gitlab = FakeGitLab::new();
    let provider = gitlab.provider();
    let ctx = OperationContext::new();
    gitlab.fail_next(HttpMethod::Post, FILES, 400, refresh());
    gitlab.fail_next(HttpMethod::Post, FILES, 400, refresh());

    let state = provider.create(&ctx, &readme()).await.unwrap();
    assert!(state.exists);
    assert_eq!(gitlab.count(HttpMethod::Post, FILES), 3);
}

#[tokio::test]
async fn other_errors_are_not_retried() {
    let gitlab = FakeGitLab::new();
    let provider = gitlab.provider();
    let ctx = OperationContext::new();
    gitlab.fail_next(
        HttpMethod::Post,
        FILES,
        400,
        json!({"message": "You are not allowed to push into this branch"}),
    );

    let err = provider.create(&ctx, &readme()).await.unwrap_err();
    assert!(err.to_string().contains("not allowed to push"), "{}", err);
    assert_eq!(gitlab.count(HttpMethod::Post, FILES), 1);
}

#[tokio::test]
async fn create_waits_for_the_file_lock() {
    let gitlab = FakeGitLab::new();
    let provider = gitlab.provider();
    let ctx = OperationContext::new();

    let _held = provider.client().file_lock().acquire(&ctx).await.unwrap();
    let short = ctx.with_timeout(Duration::from_millis(50));
    let err = provider.create(&short, &readme()).await.unwrap_err();

    assert!(err.to_string().contains("failed to acquire lock"), "{}", err);
    assert_eq!(gitlab.count(HttpMethod::Post, FILES), 0);
}

#[tokio::test]
async fn cancelled_context_releases_waiter() {
    let gitlab = FakeGitLab::new();
    let provider = gitlab.provider();
    let ctx = OperationContext::new();

    let _held = provider.client().file_lock().acquire(&ctx).await.unwrap();
    let waiter = OperationContext::new();
    let cancel = waiter.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
    });

    let err = provider.create(&waiter, &readme()).await.unwrap_err();
    assert!(err.to_string().contains("cancelled"), "{}", err);
    assert!(gitlab.requests().is_empty());
}

#[tokio::test]
async fn update_sends_last_commit_id() {
    let gitlab = FakeGitLab::new();
    let provider = gitlab.provider();
    let ctx = OperationContext::new();

    let state = provider.create(&ctx, &readme()).await.unwrap();
    let desired = readme().with_attribute("content", "goodbye world");
    gitlab.fail_next(HttpMethod::Put, FILES, 400, refresh());

    let updated = provider.update(&ctx, &state, &desired).await.unwrap();
    assert_eq!(updated.attributes.get("content"), Some(&Value::from("goodbye world")));
    assert_eq!(gitlab.count(HttpMethod::Put, FILES), 2);
}

#[tokio::test]
async fn delete_and_refresh() {
    let gitlab = FakeGitLab::new();
    let provider = gitlab.provider();
    let ctx = OperationContext::new();

    let state = provider.create(&ctx, &readme()).await.unwrap();
    provider.delete(&ctx, &state).await.unwrap();
    assert!(gitlab.object("file/42/main/docs/README.md").is_none());

    let gone = provider.read(&ctx, &state).await.unwrap();
    assert!(!gone.exists);
}

#[tokio::test]
async fn data_source_reads_at_ref() {
    let gitlab = FakeGitLab::new();
    let provider = gitlab.provider();
    let ctx = OperationContext::new();
    provider.create(&ctx, &readme()).await.unwrap();

    let lookup = Resource::new("gitlab_repository_file", "readme")
        .with_attribute("project", "42")
        .with_attribute("file_path", "docs/README.md")
        .with_attribute("ref", "main")
        .with_read_only(true);
    let state = provider.read_data_source(&ctx, &lookup).await.unwrap();

    assert_eq!(state.identifier.as_deref(), Some("42:main:docs/README.md"));
    assert_eq!(state.attributes.get("content"), Some(&Value::from("aGVsbG8gd29ybGQ=")));
}
