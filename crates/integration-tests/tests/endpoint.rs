//! Integration tests for the HTTP surface: signatures, PING and health.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ed25519_dalek::SigningKey;
use serde_json::json;
use waco_verify_bot::discord::signature::TIMESTAMP_HEADER;
use waco_verify_integration_tests::{ACCOUNT, APPLICANT, TestContext, link_command, sign};

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let ctx = TestContext::new().await;

    let (status, reply) = ctx
        .interact(&json!({"application_id": "100", "type": 1, "token": "t"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, json!({"type": 1}));
}

#[tokio::test]
async fn test_forged_signature_never_reaches_the_store() {
    let ctx = TestContext::new().await;
    let forger = SigningKey::from_bytes(&[1u8; 32]);

    let (status, _) = ctx.send(sign(&forger, &link_command(APPLICANT, ACCOUNT))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(ctx.store.applications().await.is_empty());
    assert!(ctx.platform.calls().is_empty());
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let ctx = TestContext::new().await;
    let mut request = ctx.signed(&json!({"application_id": "100", "type": 1, "token": "t"}));
    request
        .headers_mut()
        .insert(TIMESTAMP_HEADER, "1000000000".parse().unwrap());

    let (status, _) = ctx.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let ctx = TestContext::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/discord/interactions")
        .header(TIMESTAMP_HEADER, "1")
        .body(Body::from(r#"{"type":1}"#))
        .unwrap();

    let (status, _) = ctx.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signed_non_interaction_is_bad_request() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx.interact(&json!({"type": 1})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;
    let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

    assert_eq!(ctx.send(get("/health")).await.0, StatusCode::OK);
    assert_eq!(ctx.send(get("/health/ready")).await.0, StatusCode::OK);

    ctx.store.set_unavailable(true);
    assert_eq!(
        ctx.send(get("/health/ready")).await.0,
        StatusCode::SERVICE_UNAVAILABLE
    );
}
