//! Discord interactions endpoint.
//!
//! Discord POSTs every slash command and button click here, signed with the
//! application's Ed25519 key. Input is validated inline; the link and the
//! decision are acknowledged immediately and completed in the background,
//! since Discord drops interactions left unanswered for three seconds.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use tracing::{Instrument, debug, error, info, instrument, warn};
use waco_verify_core::{AccountId, ApplicationControl};

use crate::discord::commands::{LINK_COMMAND, LINK_USER_ID_OPTION};
use crate::discord::messages;
use crate::discord::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::discord::{
    GuildMember, Interaction, InteractionResponse, InteractionType, MessagePayload,
    SignatureError,
};
use crate::error::AppError;
use crate::models::{Actor, Requester};
use crate::services::DecisionError;
use crate::state::AppState;

/// Create the interactions router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/discord/interactions", post(handle_interaction))
}

/// Verify, parse and dispatch an interaction.
#[instrument(skip(state, headers, body))]
async fn handle_interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InteractionResponse>, AppError> {
    let signature = header(&headers, SIGNATURE_HEADER).ok_or(SignatureError::MalformedSignature)?;
    let timestamp = header(&headers, TIMESTAMP_HEADER).ok_or(SignatureError::InvalidTimestamp)?;

    state.verifier().verify(signature, timestamp, &body)?;
    debug!("Interaction signature verified");

    let interaction: Interaction = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Failed to parse interaction: {e}")))?;

    let response = match interaction.interaction_type() {
        InteractionType::Ping => InteractionResponse::pong(),
        InteractionType::ApplicationCommand => handle_command(&state, interaction)?,
        InteractionType::MessageComponent => handle_component(&state, interaction)?,
        InteractionType::Other(kind) => {
            warn!(kind, "Unsupported interaction type");
            return Err(AppError::BadRequest(format!(
                "Unsupported interaction type {kind}"
            )));
        }
    };

    Ok(Json(response))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `/link user_id`: validate inline, link in the background and answer with a
/// private follow-up.
fn handle_command(
    state: &AppState,
    interaction: Interaction,
) -> Result<InteractionResponse, AppError> {
    if interaction.command_name() != Some(LINK_COMMAND) {
        warn!(command = ?interaction.command_name(), "Unknown command");
        return Err(AppError::BadRequest("Unknown command".into()));
    }

    let requester = requester(&interaction)
        .ok_or_else(|| AppError::BadRequest("Interaction has no invoking user".into()))?;

    let Some(account_id) = interaction
        .integer_option(LINK_USER_ID_OPTION)
        .filter(|id| *id > 0)
        .map(AccountId::new)
    else {
        return Ok(InteractionResponse::ephemeral(messages::LINK_INVALID_INPUT));
    };

    let state = state.clone();
    let token = interaction.token;
    tokio::spawn(
        async move {
            let reply = match state.linker().link(&requester, account_id).await {
                Ok(receipt) => receipt.user_message(),
                Err(e) => {
                    if e.is_user_error() {
                        info!(error = %e, "Link refused");
                    } else {
                        let event_id = sentry::capture_error(&e);
                        error!(error = %e, sentry_event_id = %event_id, "Link failed");
                    }
                    e.user_message().to_string()
                }
            };

            let payload = MessagePayload::ephemeral(reply);
            if let Err(e) = state.platform().send_followup(&token, payload).await {
                warn!(error = %e, "Link reply not delivered");
            }
        }
        .in_current_span(),
    );

    Ok(InteractionResponse::deferred_ephemeral())
}

/// Approve/Reject button: guard inline, decide in the background.
fn handle_component(
    state: &AppState,
    interaction: Interaction,
) -> Result<InteractionResponse, AppError> {
    let custom_id = interaction
        .custom_id()
        .ok_or_else(|| AppError::BadRequest("Component interaction without custom_id".into()))?;

    let control = match ApplicationControl::parse(custom_id) {
        Ok(control) => control,
        Err(e) => {
            warn!(custom_id, error = %e, "Unrecognized component");
            return Ok(InteractionResponse::ephemeral(
                messages::DECISION_MISSING_APPLICATION,
            ));
        }
    };

    let actor = actor(&interaction)
        .ok_or_else(|| AppError::BadRequest("Interaction has no invoking user".into()))?;

    if let Err(e) = state.decisions().authorize(&actor) {
        info!(actor_id = %actor.id, application_id = %control.application_id, "Decision denied");
        return Ok(InteractionResponse::ephemeral(
            e.user_message(control.decision),
        ));
    }

    let state = state.clone();
    let guild_id = interaction.guild_id;
    let token = interaction.token;
    tokio::spawn(
        async move {
            match state.decisions().decide(&actor, control, guild_id).await {
                Ok(report) => debug!(
                    role_warnings = report.role_changes.iter().filter(|c| c.is_warning()).count(),
                    card_updated = report.card_updated,
                    applicant_notified = report.applicant_notified,
                    "Decision completed"
                ),
                Err(e) => {
                    if matches!(e, DecisionError::Persistence(_)) {
                        let event_id = sentry::capture_error(&e);
                        error!(error = %e, sentry_event_id = %event_id, "Decision failed");
                    } else {
                        info!(error = %e, "Decision refused");
                    }
                    let payload = MessagePayload::ephemeral(e.user_message(control.decision));
                    if let Err(e) = state.platform().send_followup(&token, payload).await {
                        warn!(error = %e, "Decision follow-up not delivered");
                    }
                }
            }
        }
        .in_current_span(),
    );

    Ok(InteractionResponse::deferred_update())
}

fn requester(interaction: &Interaction) -> Option<Requester> {
    let user = interaction.invoker()?;
    let display_name = interaction
        .member
        .as_ref()
        .and_then(GuildMember::display_name)
        .unwrap_or_else(|| user.display_name())
        .to_string();

    Some(Requester {
        id: user.id,
        display_name,
        avatar_url: Some(user.avatar_url()),
    })
}

/// The clicking user. Roles are only known inside a guild.
fn actor(interaction: &Interaction) -> Option<Actor> {
    let user = interaction.invoker()?;
    Some(Actor {
        id: user.id,
        name: user.username.clone(),
        roles: interaction.member.as_ref().map(|m| m.roles.clone()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use ed25519_dalek::{Signer, SigningKey};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::db::InMemoryLinkStore;
    use crate::testing::{self, Operation, RecordingPlatform};

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[3u8; 32])
    }

    async fn app_with(platform: Arc<RecordingPlatform>) -> Router {
        let key = signing_key();
        let config = testing::test_config(&hex::encode(key.verifying_key().as_bytes()));
        let store = Arc::new(InMemoryLinkStore::new());
        store.insert_account(testing::account(42, "Nova", None)).await;
        let state = AppState::new(config, store, platform).unwrap();
        router().with_state(state)
    }

    async fn app() -> Router {
        app_with(Arc::new(RecordingPlatform::new())).await
    }

    fn link_command(options: &Value) -> Value {
        json!({
            "application_id": "100",
            "type": 2,
            "token": "t",
            "guild_id": "2000",
            "member": {"user": {"id": "555", "username": "nova"}, "roles": []},
            "data": {"name": "link", "options": options}
        })
    }

    fn signed_request(body: &Value, key: &SigningKey) -> Request<Body> {
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

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping_returns_pong() {
        let ping = json!({"application_id": "100", "type": 1, "token": "t"});
        let response = app()
            .await
            .oneshot(signed_request(&ping, &signing_key()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"type": 1}));
    }

    #[tokio::test]
    async fn test_unsigned_request_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/discord/interactions")
            .body(Body::from(r#"{"type":1}"#))
            .unwrap();

        let response = app().await.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_foreign_key_signature_rejected() {
        let ping = json!({"application_id": "100", "type": 1, "token": "t"});
        let other = SigningKey::from_bytes(&[4u8; 32]);
        let response = app().await.oneshot(signed_request(&ping, &other)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_link_without_option_asks_for_valid_id() {
        let command = link_command(&json!([]));
        let response = app()
            .await
            .oneshot(signed_request(&command, &signing_key()))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["type"], 4);
        assert_eq!(body["data"]["flags"], 64);
        assert_eq!(body["data"]["content"], messages::LINK_INVALID_INPUT);
    }

    #[tokio::test]
    async fn test_link_acknowledged_without_waiting_for_card() {
        let platform = Arc::new(RecordingPlatform::new());
        platform.delay(Operation::PostCard, Duration::from_secs(30));
        let command = link_command(&json!([{"name": "user_id", "type": 4, "value": 42}]));

        let response = tokio::time::timeout(
            Duration::from_secs(1),
            app_with(platform.clone())
                .await
                .oneshot(signed_request(&command, &signing_key())),
        )
        .await
        .expect("link reply waited on the review card")
        .unwrap();

        let body = json_body(response).await;
        assert_eq!(body, json!({"type": 5, "data": {"flags": 64}}));
        assert!(platform.followups("t").is_empty());
    }

    #[tokio::test]
    async fn test_link_result_arrives_as_private_followup() {
        let platform = Arc::new(RecordingPlatform::new());
        let command = link_command(&json!([{"name": "user_id", "type": 4, "value": 42}]));

        let response = app_with(platform.clone())
            .await
            .oneshot(signed_request(&command, &signing_key()))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["type"], 5);

        let mut followups = Vec::new();
        for _ in 0..200 {
            followups = platform.followups("t");
            if !followups.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(followups.len(), 1);
        assert_eq!(
            followups[0].content.as_deref(),
            Some(messages::link_success("Nova").as_str())
        );
        assert_eq!(followups[0].flags, Some(64));
    }

    #[tokio::test]
    async fn test_non_staff_click_denied_inline() {
        let click = json!({
            "application_id": "100",
            "type": 3,
            "token": "t",
            "guild_id": "2000",
            "member": {"user": {"id": "777", "username": "rando"}, "roles": ["30"]},
            "data": {
                "custom_id": "application:approve:6f1c1f9e-4f3b-4a53-9d0e-6b8a7f7c2a11",
                "component_type": 2
            }
        });
        let response = app()
            .await
            .oneshot(signed_request(&click, &signing_key()))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["type"], 4);
        assert_eq!(body["data"]["content"], messages::DECISION_DENIED);
    }
}
