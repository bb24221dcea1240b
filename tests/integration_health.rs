#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::cast_precision_loss, clippy::clone_on_ref_ptr, clippy::match_same_arms, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use async_trait::async_trait;
use axum::http::StatusCode;
use courier_server::adapters::storage::{ImageStore, ImageUpload};
use courier_server::error::{AppError, Result};
use std::sync::Arc;

mod common;

#[derive(Debug)]
struct UnreachableStorage;

#[async_trait]
impl ImageStore for UnreachableStorage {
    async fn put_image(&self, _image: ImageUpload) -> Result<String> {
        Err(AppError::Storage("bucket unreachable".into()))
    }

    async fn delete_image(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Err(AppError::Storage("bucket unreachable".into()))
    }
}

#[tokio::test]
async fn test_livez() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/livez", app.mgmt_url)).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readyz_happy_path() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["imageStorage"], "ok");
}

#[tokio::test]
async fn test_readyz_storage_error() {
    let app = common::TestApp::spawn_with(common::get_test_config(), Arc::new(UnreachableStorage)).await;

    let resp = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["imageStorage"], "error");
}

#[tokio::test]
async fn test_image_upload_failure_is_internal_error() {
    let app = common::TestApp::spawn_with(common::get_test_config(), Arc::new(UnreachableStorage)).await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;

    let resp = app
        .client
        .post(format!("{}/messages/send/{}", app.api_url, bob.user_id))
        .bearer_auth(&alice.token)
        .json(&serde_json::json!({ "text": "pic", "image": "data:image/png;base64,iVBORw0KGgo=" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
    assert!(app.conversation(&alice, bob.user_id).await.is_empty());
}
