//! Discord REST API client.
//!
//! Provides the message, member and command operations behind
//! [`ChatPlatform`]. Authenticates with the bot token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use waco_verify_core::{ChannelId, DiscordApplicationId, GuildId, MessageId, RoleId, UserId};

use super::error::DiscordError;
use super::platform::ChatPlatform;
use super::types::{
    ApiErrorBody, CommandDefinition, DmChannel, GuildMember, Message, MessagePayload,
    RegisteredCommand,
};
use crate::config::DiscordConfig;

const USER_AGENT_VALUE: &str = concat!(
    "DiscordBot (https://github.com/wacorp/waco-verify, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Header carrying the audit log reason for moderation actions.
const AUDIT_LOG_REASON: &str = "X-Audit-Log-Reason";

/// Longest rate-limit wait honoured before giving up.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Discord REST API client.
#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    bot_token: SecretString,
    api_base: String,
    application_id: DiscordApplicationId,
    /// Register commands in this guild only; global otherwise.
    command_guild_id: Option<GuildId>,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("application_id", &self.application_id)
            .field("command_guild_id", &self.command_guild_id)
            .finish_non_exhaustive()
    }
}

impl DiscordClient {
    /// Create a new Discord client.
    #[must_use]
    pub fn new(
        bot_token: SecretString,
        application_id: DiscordApplicationId,
        api_base: impl Into<String>,
        command_guild_id: Option<GuildId>,
    ) -> Self {
        let api_base: String = api_base.into();
        Self {
            client: Client::new(),
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            application_id,
            command_guild_id,
        }
    }

    /// Create a client from configuration.
    #[must_use]
    pub fn from_config(config: &DiscordConfig) -> Self {
        Self::new(
            config.bot_token.clone(),
            config.application_id,
            config.api_base.clone(),
            config.guild_id,
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .header(
                AUTHORIZATION,
                format!("Bot {}", self.bot_token.expose_secret()),
            )
            .header(USER_AGENT, USER_AGENT_VALUE)
    }

    /// Send a request, retrying once after a short rate limit.
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, DiscordError> {
        let retry = builder.try_clone();
        let response = builder
            .send()
            .await
            .map_err(|e| DiscordError::Request(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS
            && let Some(retry) = retry
            && let Some(wait) = retry_after(&response)
        {
            warn!(wait_ms = wait.as_millis(), "Discord rate limit hit, retrying");
            tokio::time::sleep(wait).await;
            let response = retry
                .send()
                .await
                .map_err(|e| DiscordError::Request(e.to_string()))?;
            return check_status(response).await;
        }

        check_status(response).await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, DiscordError> {
        let response = self.execute(self.request(method, path).json(body)).await?;
        response
            .json()
            .await
            .map_err(|e| DiscordError::Response(e.to_string()))
    }

    fn commands_path(&self) -> String {
        match self.command_guild_id {
            Some(guild) => format!("/applications/{}/guilds/{guild}/commands", self.application_id),
            None => format!("/applications/{}/commands", self.application_id),
        }
    }
}

/// Map non-success responses to [`DiscordError::Api`].
async fn check_status(response: Response) -> Result<Response, DiscordError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|e| format!("{} (code {})", e.message, e.code))
        .unwrap_or(body);

    Err(DiscordError::Api { status, message })
}

/// Wait requested by a 429 response, if short enough to honour.
fn retry_after(response: &Response) -> Option<Duration> {
    let secs: f64 = response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .parse()
        .ok()?;
    let wait = Duration::try_from_secs_f64(secs).ok()?;
    (wait <= MAX_RETRY_AFTER).then_some(wait)
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    #[instrument(skip(self, payload), fields(channel_id = %channel_id))]
    async fn post_card(
        &self,
        channel_id: ChannelId,
        payload: MessagePayload,
    ) -> Result<Message, DiscordError> {
        let message: Message = self
            .send_json(
                Method::POST,
                &format!("/channels/{channel_id}/messages"),
                &payload,
            )
            .await?;

        debug!(message_id = %message.id, "Card posted to Discord");
        Ok(message)
    }

    #[instrument(skip(self, payload), fields(channel_id = %channel_id, message_id = %message_id))]
    async fn edit_card(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        payload: MessagePayload,
    ) -> Result<(), DiscordError> {
        self.execute(
            self.request(
                Method::PATCH,
                &format!("/channels/{channel_id}/messages/{message_id}"),
            )
            .json(&payload),
        )
        .await?;

        debug!("Card updated in Discord");
        Ok(())
    }

    #[instrument(skip(self), fields(guild_id = %guild_id, user_id = %user_id))]
    async fn get_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Option<GuildMember>, DiscordError> {
        let result = self
            .execute(self.request(
                Method::GET,
                &format!("/guilds/{guild_id}/members/{user_id}"),
            ))
            .await;

        match result {
            Ok(response) => response
                .json()
                .await
                .map(Some)
                .map_err(|e| DiscordError::Response(e.to_string())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, reason), fields(guild_id = %guild_id, user_id = %user_id, role_id = %role_id))]
    async fn add_member_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), DiscordError> {
        self.execute(
            self.request(
                Method::PUT,
                &format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}"),
            )
            .header(AUDIT_LOG_REASON, urlencoding::encode(reason).into_owned()),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, reason), fields(guild_id = %guild_id, user_id = %user_id, role_id = %role_id))]
    async fn remove_member_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> Result<(), DiscordError> {
        self.execute(
            self.request(
                Method::DELETE,
                &format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}"),
            )
            .header(AUDIT_LOG_REASON, urlencoding::encode(reason).into_owned()),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, content), fields(user_id = %user_id))]
    async fn send_direct_message(
        &self,
        user_id: UserId,
        content: &str,
    ) -> Result<(), DiscordError> {
        #[derive(Serialize)]
        struct OpenDm {
            recipient_id: UserId,
        }

        let channel: DmChannel = self
            .send_json(
                Method::POST,
                "/users/@me/channels",
                &OpenDm {
                    recipient_id: user_id,
                },
            )
            .await?;

        self.execute(
            self.request(Method::POST, &format!("/channels/{}/messages", channel.id))
                .json(&MessagePayload::text(content)),
        )
        .await?;

        debug!("Direct message sent");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn send_followup(
        &self,
        interaction_token: &str,
        payload: MessagePayload,
    ) -> Result<(), DiscordError> {
        self.execute(
            self.request(
                Method::POST,
                &format!("/webhooks/{}/{interaction_token}", self.application_id),
            )
            .json(&payload),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, commands), fields(count = commands.len()))]
    async fn register_commands(
        &self,
        commands: &[CommandDefinition],
    ) -> Result<Vec<RegisteredCommand>, DiscordError> {
        let registered: Vec<RegisteredCommand> = self
            .send_json(Method::PUT, &self.commands_path(), &commands)
            .await?;

        debug!(
            commands = ?registered.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            guild_scoped = self.command_guild_id.is_some(),
            "Application commands registered"
        );
        Ok(registered)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::discord::types::{Embed, MessagePayload};

    fn client(base: &str, guild: Option<GuildId>) -> DiscordClient {
        DiscordClient::new(
            SecretString::from("test-token".to_string()),
            DiscordApplicationId::new(100),
            base,
            guild,
        )
    }

    #[tokio::test]
    async fn test_post_card_returns_message_ids() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/channels/300/messages")
            .match_header("authorization", "Bot test-token")
            .match_body(Matcher::PartialJson(serde_json::json!({"content": "hi"})))
            .with_status(200)
            .with_body(r#"{"id": "400", "channel_id": "300", "embeds": []}"#)
            .create_async()
            .await;

        let payload = MessagePayload {
            content: Some("hi".to_string()),
            embeds: Some(vec![Embed::default()]),
            ..MessagePayload::default()
        };
        let message = client(&server.url(), None)
            .post_card(ChannelId::new(300), payload)
            .await
            .unwrap();

        assert_eq!(message.id, MessageId::new(400));
        assert_eq!(message.channel_id, ChannelId::new(300));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_member_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/guilds/1/members/2")
            .with_status(404)
            .with_body(r#"{"message": "Unknown Member", "code": 10007}"#)
            .create_async()
            .await;

        let member = client(&server.url(), None)
            .get_member(GuildId::new(1), UserId::new(2))
            .await
            .unwrap();
        assert!(member.is_none());
    }

    #[tokio::test]
    async fn test_get_member_parses_roles() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/guilds/1/members/2")
            .with_status(200)
            .with_body(r#"{"user": {"id": "2", "username": "nova"}, "roles": ["7", "8"]}"#)
            .create_async()
            .await;

        let member = client(&server.url(), None)
            .get_member(GuildId::new(1), UserId::new(2))
            .await
            .unwrap()
            .unwrap();
        assert!(member.has_role(RoleId::new(7)));
    }

    #[tokio::test]
    async fn test_role_change_sends_encoded_audit_reason() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/guilds/1/members/2/roles/3")
            .match_header(
                "x-audit-log-reason",
                "Application%20approved%20by%20moderator%20mod",
            )
            .with_status(204)
            .create_async()
            .await;

        client(&server.url(), None)
            .add_member_role(
                GuildId::new(1),
                UserId::new(2),
                RoleId::new(3),
                "Application approved by moderator mod",
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forbidden_role_change_is_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/guilds/1/members/2/roles/3")
            .with_status(403)
            .with_body(r#"{"message": "Missing Permissions", "code": 50013}"#)
            .create_async()
            .await;

        let err = client(&server.url(), None)
            .remove_member_role(GuildId::new(1), UserId::new(2), RoleId::new(3), "r")
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
        assert!(err.to_string().contains("Missing Permissions"));
    }

    #[tokio::test]
    async fn test_direct_message_opens_channel_first() {
        let mut server = mockito::Server::new_async().await;
        let open = server
            .mock("POST", "/users/@me/channels")
            .match_body(Matcher::Json(serde_json::json!({"recipient_id": "555"})))
            .with_status(200)
            .with_body(r#"{"id": "900"}"#)
            .create_async()
            .await;
        let send = server
            .mock("POST", "/channels/900/messages")
            .with_status(200)
            .with_body(r#"{"id": "901", "channel_id": "900"}"#)
            .create_async()
            .await;

        client(&server.url(), None)
            .send_direct_message(UserId::new(555), "hello")
            .await
            .unwrap();
        open.assert_async().await;
        send.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_commands_guild_scoped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/applications/100/guilds/5/commands")
            .with_status(200)
            .with_body(r#"[{"id": "1", "name": "link"}]"#)
            .create_async()
            .await;

        let registered = client(&server.url(), Some(GuildId::new(5)))
            .register_commands(&[])
            .await
            .unwrap();
        assert_eq!(registered[0].name, "link");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried_once() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("PATCH", "/channels/1/messages/2")
            .with_status(429)
            .with_header("retry-after", "0")
            .expect(2)
            .create_async()
            .await;

        let err = client(&server.url(), None)
            .edit_card(ChannelId::new(1), MessageId::new(2), MessagePayload::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
        limited.assert_async().await;
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", client(crate::config::DEFAULT_DISCORD_API_BASE, None));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test-token"));
    }
}
