//! Integration tests for Waco Verify.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p waco-verify-integration-tests
//! ```
//!
//! The tests drive the real router with signed interaction payloads. Storage
//! is the in-memory store and Discord is the recording platform from the
//! bot's `test-support` feature, so no database or network is needed.
//!
//! # Test Categories
//!
//! - `linking` - `/link` binding, review cards and the private follow-up
//! - `decisions` - Approve/Reject through the button interactions
//! - `endpoint` - Signature checks, PING and health

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{Value, json};
use tower::ServiceExt;
use waco_verify_bot::db::InMemoryLinkStore;
use waco_verify_bot::discord::MessagePayload;
use waco_verify_bot::discord::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use waco_verify_bot::routes;
use waco_verify_bot::state::AppState;
use waco_verify_bot::testing::{self, GUILD, NOVICE_ROLE, RecordingPlatform};
use waco_verify_core::{RoleId, UserId};

/// Account seeded in every context.
pub const ACCOUNT: i64 = 42;
/// Discord user who links [`ACCOUNT`].
pub const APPLICANT: u64 = 555;

/// A bot wired to in-memory collaborators.
pub struct TestContext {
    pub store: Arc<InMemoryLinkStore>,
    pub platform: Arc<RecordingPlatform>,
    pub state: AppState,
    signing_key: SigningKey,
}

impl TestContext {
    /// Seed account #42 "Nova" (unbound) and put the applicant in the guild
    /// with the novice role.
    pub async fn new() -> Self {
        let signing_key = SigningKey::from_bytes(&[9u8; 32]);
        let config = testing::test_config(&hex::encode(signing_key.verifying_key().as_bytes()));

        let store = Arc::new(InMemoryLinkStore::new());
        store
            .insert_account(testing::account(ACCOUNT, "Nova", Some("Builder RP")))
            .await;

        let platform = Arc::new(RecordingPlatform::new());
        platform.add_member(UserId::new(APPLICANT), vec![NOVICE_ROLE]);

        let state = AppState::new(config, store.clone(), platform.clone()).unwrap();

        Self {
            store,
            platform,
            state,
            signing_key,
        }
    }

    #[must_use]
    pub fn router(&self) -> Router {
        routes::app(self.state.clone())
    }

    /// Build a request signed with the application key.
    #[must_use]
    pub fn signed(&self, body: &Value) -> Request<Body> {
        sign(&self.signing_key, body)
    }

    /// Send a signed interaction and decode the JSON reply.
    pub async fn interact(&self, body: &Value) -> (StatusCode, Value) {
        self.send(self.signed(body)).await
    }

    /// Run `/link` and wait for the private follow-up carrying its result.
    pub async fn link(&self, user_id: u64, account: i64) -> MessagePayload {
        let token = link_token(user_id);
        let before = self.platform.followups(&token).len();

        let (status, reply) = self.interact(&link_command(user_id, account)).await;
        assert!(status.is_success());
        assert_eq!(reply, json!({"type": 5, "data": {"flags": 64}}));

        assert!(
            eventually(|| self.platform.followups(&token).len() > before).await,
            "no follow-up for /link"
        );
        self.platform.followups(&token).pop().unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

/// Sign `body` as Discord would, with the current timestamp.
#[must_use]
pub fn sign(key: &SigningKey, body: &Value) -> Request<Body> {
    let body = body.to_string();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = key.sign(format!("{timestamp}{body}").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/discord/interactions")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, hex::encode(signature.to_bytes()))
        .header(TIMESTAMP_HEADER, timestamp)
        .body(Body::from(body))
        .unwrap()
}

fn member(user_id: u64, roles: &[RoleId]) -> Value {
    json!({
        "user": {"id": user_id.to_string(), "username": format!("user-{user_id}")},
        "roles": roles.iter().map(ToString::to_string).collect::<Vec<_>>(),
    })
}

/// Interaction token used by [`link_command`].
#[must_use]
pub fn link_token(user_id: u64) -> String {
    format!("link-token-{user_id}")
}

/// `/link user_id:<account>` from a guild member.
#[must_use]
pub fn link_command(user_id: u64, account: i64) -> Value {
    json!({
        "application_id": "100",
        "type": 2,
        "token": link_token(user_id),
        "guild_id": GUILD.to_string(),
        "member": member(user_id, &[]),
        "data": {
            "name": "link",
            "options": [{"name": "user_id", "type": 4, "value": account}]
        }
    })
}

/// A button click on a review card.
#[must_use]
pub fn button_click(user_id: u64, roles: &[RoleId], custom_id: &str) -> Value {
    json!({
        "application_id": "100",
        "type": 3,
        "token": format!("click-token-{user_id}"),
        "guild_id": GUILD.to_string(),
        "member": member(user_id, roles),
        "data": {"custom_id": custom_id, "component_type": 2}
    })
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
