//! Integration tests for `/link`.
//!
//! Each test drives the interactions endpoint with a signed slash command
//! and checks the account row, the review card and the private follow-up.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::http::StatusCode;
use waco_verify_bot::discord::messages;
use waco_verify_bot::testing::{Operation, PlatformCall, REVIEW_CHANNEL};
use waco_verify_core::{AccountId, ApplicationStatus};
use waco_verify_integration_tests::{
    ACCOUNT, APPLICANT, TestContext, eventually, link_command, link_token,
};

// =============================================================================
// Binding
// =============================================================================

#[tokio::test]
async fn test_link_binds_account_and_posts_card() {
    let ctx = TestContext::new().await;

    let reply = ctx.link(APPLICANT, ACCOUNT).await;

    assert_eq!(reply.flags, Some(64));
    assert_eq!(reply.content, Some(messages::link_success("Nova")));

    let account = ctx.store.account(AccountId::new(ACCOUNT)).await.unwrap();
    assert_eq!(account.discord_id.as_deref(), Some("555"));

    let calls = ctx.platform.calls();
    let Some(PlatformCall::PostCard { channel_id, payload }) = calls.first() else {
        panic!("expected the review card to be posted first, got {calls:?}");
    };
    assert_eq!(*channel_id, REVIEW_CHANNEL);

    let card = &payload.embeds.as_ref().unwrap()[0];
    let field = |name: &str| {
        card.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.clone())
            .unwrap_or_default()
    };
    assert!(field("Player").contains("Nova"));
    assert!(field("User ID").contains("42"));
    assert!(field("Discord").contains("<@555>"));
    assert!(card.description.as_deref().unwrap().contains("Builder RP"));
}

#[tokio::test]
async fn test_relink_by_same_identity_is_noop_success() {
    let ctx = TestContext::new().await;
    ctx.link(APPLICANT, ACCOUNT).await;

    let reply = ctx.link(APPLICANT, ACCOUNT).await;

    assert_eq!(reply.content, Some(messages::link_already_pending("Nova")));
    assert_eq!(ctx.platform.posted_cards().len(), 1);

    let applications = ctx.store.applications().await;
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0].status, ApplicationStatus::Pending);
}

#[tokio::test]
async fn test_link_by_other_identity_is_refused() {
    let ctx = TestContext::new().await;
    ctx.link(APPLICANT, ACCOUNT).await;
    let before = ctx.store.account(AccountId::new(ACCOUNT)).await;

    let reply = ctx.link(777, ACCOUNT).await;

    assert_eq!(reply.content.as_deref(), Some(messages::LINK_ALREADY_LINKED));
    assert_eq!(ctx.store.account(AccountId::new(ACCOUNT)).await, before);
    assert_eq!(ctx.platform.posted_cards().len(), 1);
}

#[tokio::test]
async fn test_link_unknown_account() {
    let ctx = TestContext::new().await;

    let reply = ctx.link(APPLICANT, 4_242).await;

    assert_eq!(reply.content.as_deref(), Some(messages::LINK_ACCOUNT_NOT_FOUND));
    assert!(ctx.platform.posted_cards().is_empty());
}

#[tokio::test]
async fn test_link_rejects_non_positive_id_inline() {
    let ctx = TestContext::new().await;

    let (_, reply) = ctx.interact(&link_command(APPLICANT, 0)).await;

    assert_eq!(reply["type"], 4);
    assert_eq!(reply["data"]["content"], messages::LINK_INVALID_INPUT);
    assert!(ctx.store.applications().await.is_empty());
    assert!(ctx.platform.calls().is_empty());
}

// =============================================================================
// Slow or failing Discord
// =============================================================================

#[tokio::test]
async fn test_slow_card_post_does_not_delay_acknowledgement() {
    let ctx = TestContext::new().await;
    ctx.platform.delay(Operation::PostCard, Duration::from_millis(500));

    let (status, reply) = tokio::time::timeout(
        Duration::from_millis(200),
        ctx.interact(&link_command(APPLICANT, ACCOUNT)),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["type"], 5);
    assert!(ctx.platform.followups(&link_token(APPLICANT)).is_empty());

    assert!(eventually(|| !ctx.platform.followups(&link_token(APPLICANT)).is_empty()).await);
    let followup = ctx.platform.followups(&link_token(APPLICANT)).remove(0);
    assert_eq!(followup.content, Some(messages::link_success("Nova")));
}

#[tokio::test]
async fn test_failed_card_posts_leave_no_orphaned_applications() {
    let ctx = TestContext::new().await;
    ctx.platform.fail(Operation::PostCard, StatusCode::SERVICE_UNAVAILABLE);

    for _ in 0..3 {
        let reply = ctx.link(APPLICANT, ACCOUNT).await;
        assert_eq!(
            reply.content.as_deref(),
            Some(messages::LINK_CARD_DELIVERY_FAILED)
        );
    }
    assert!(ctx.store.applications().await.is_empty());

    ctx.platform.clear_failures();
    let reply = ctx.link(APPLICANT, ACCOUNT).await;

    assert_eq!(reply.content, Some(messages::link_success("Nova")));
    let applications = ctx.store.applications().await;
    assert_eq!(applications.len(), 1);
    assert!(applications[0].card_location().is_some());
}

#[tokio::test]
async fn test_link_during_outage_reports_generic_failure() {
    let ctx = TestContext::new().await;
    ctx.store.set_unavailable(true);

    let reply = ctx.link(APPLICANT, ACCOUNT).await;

    assert_eq!(reply.content.as_deref(), Some(messages::LINK_FAILED));
    assert!(ctx.platform.posted_cards().is_empty());
}
