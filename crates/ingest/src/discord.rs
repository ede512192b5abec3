//! Discord REST client: guild archive reads and operator DMs.

use crate::archive::{ArchiveSource, OperatorNotifier};
use crate::error::{IngestError, IngestResult};
use async_trait::async_trait;
use chrono::DateTime;
use dirtonyou_core::config::DiscordConfig;
use dirtonyou_core::constants::{DISCORD_MESSAGE_LIMIT, MAX_PAGE_SIZE};
use dirtonyou_core::{Channel, ChannelKind, ChatMessage};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct GuildPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
}

impl From<ChannelPayload> for Channel {
    fn from(payload: ChannelPayload) -> Self {
        Channel {
            name: payload.name.unwrap_or_else(|| payload.id.clone()),
            id: payload.id,
            kind: ChannelKind::from_discord(payload.kind),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    id: String,
    channel_id: String,
    #[serde(default)]
    content: String,
    timestamp: String,
    author: AuthorPayload,
}

impl MessagePayload {
    fn into_chat_message(self, space_id: &str) -> ChatMessage {
        let ts = match DateTime::parse_from_rfc3339(&self.timestamp) {
            Ok(parsed) => parsed.timestamp(),
            Err(err) => {
                warn!(message = %self.id, timestamp = %self.timestamp, error = %err, "unparsable message timestamp");
                0
            }
        };
        ChatMessage {
            id: self.id,
            space_id: space_id.to_string(),
            channel_id: self.channel_id,
            author_id: self.author.id,
            content: self.content,
            ts,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DmChannelPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitPayload {
    retry_after: f64,
}

pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    retries: u32,
    operator_id: Option<String>,
    dm_channel: OnceCell<String>,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig) -> IngestResult<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| IngestError::validation("discord bot token is not configured"))?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            retries: config.rate_limit_retries,
            operator_id: config.admin_id.clone(),
            dm_channel: OnceCell::new(),
        })
    }

    /// Send one REST call, waiting out HTTP 429 answers up to the configured
    /// retry count.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> IngestResult<T> {
        let url = format!("{}{}", self.api_base, path);
        let mut attempt = 0u32;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bot {}", self.token));
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let resp = request.send().await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let header = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let text = resp.text().await.unwrap_or_default();
                if attempt >= self.retries {
                    return Err(IngestError::archive(format!(
                        "{} {} still rate limited after {} retries",
                        method, path, attempt
                    )));
                }
                let wait = parse_retry_after(header.as_deref(), &text);
                attempt += 1;
                warn!(path = %path, attempt, wait_ms = wait.as_millis() as u64, "rate limited by discord");
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(IngestError::archive(format!(
                    "{} {} returned {}: {}",
                    method, path, status, text
                )));
            }

            return Ok(resp.json::<T>().await?);
        }
    }

    async fn dm_channel_id(&self, recipient: &str) -> IngestResult<&String> {
        self.dm_channel
            .get_or_try_init(|| async {
                let body = serde_json::json!({ "recipient_id": recipient });
                let channel: DmChannelPayload = self
                    .call(Method::POST, "/users/@me/channels", &[], Some(&body))
                    .await?;
                debug!(channel = %channel.id, "opened operator DM channel");
                Ok(channel.id)
            })
            .await
    }
}

#[async_trait]
impl ArchiveSource for DiscordClient {
    async fn space_name(&self, space_id: &str) -> IngestResult<String> {
        let guild: GuildPayload = self
            .call(Method::GET, &format!("/guilds/{}", space_id), &[], None)
            .await?;
        Ok(guild.name)
    }

    async fn channels(&self, space_id: &str) -> IngestResult<Vec<Channel>> {
        let channels: Vec<ChannelPayload> = self
            .call(Method::GET, &format!("/guilds/{}/channels", space_id), &[], None)
            .await?;
        Ok(channels.into_iter().map(Channel::from).collect())
    }

    async fn fetch_page(
        &self,
        space_id: &str,
        channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> IngestResult<Vec<ChatMessage>> {
        let mut query = vec![("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        let messages: Vec<MessagePayload> = self
            .call(
                Method::GET,
                &format!("/channels/{}/messages", channel_id),
                &query,
                None,
            )
            .await?;
        Ok(messages
            .into_iter()
            .map(|m| m.into_chat_message(space_id))
            .collect())
    }
}

#[async_trait]
impl OperatorNotifier for DiscordClient {
    async fn notify(&self, text: &str) -> IngestResult<()> {
        let Some(operator) = self.operator_id.as_deref() else {
            debug!("no operator configured, dropping notification");
            return Ok(());
        };

        let channel = self
            .dm_channel_id(operator)
            .await
            .map_err(|e| IngestError::notify(e.to_string()))?;
        let path = format!("/channels/{}/messages", channel);

        for chunk in chunk_message(text, DISCORD_MESSAGE_LIMIT) {
            let body = serde_json::json!({ "content": chunk });
            self.call::<serde_json::Value>(Method::POST, &path, &[], Some(&body))
                .await
                .map_err(|e| IngestError::notify(e.to_string()))?;
        }
        Ok(())
    }
}

/// Wait requested by a 429 answer.
///
/// The JSON body's `retry_after` wins over the header; one second when
/// neither parses.
fn parse_retry_after(header: Option<&str>, body: &str) -> Duration {
    let from_body = serde_json::from_str::<RateLimitPayload>(body)
        .ok()
        .map(|p| p.retry_after);
    let from_header = header.and_then(|h| h.trim().parse::<f64>().ok());

    match from_body.or(from_header) {
        Some(secs) if secs.is_finite() && secs >= 0.0 => {
            Duration::from_secs_f64(secs).min(MAX_RETRY_WAIT)
        }
        _ => Duration::from_secs(1),
    }
}

/// Split `text` into pieces of at most `limit` characters.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_message_respects_limit() {
        let text = "a".repeat(4500);
        let chunks = chunk_message(&text, 2000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 2000);
        assert_eq!(chunks[2].len(), 500);
    }

    #[test]
    fn test_chunk_message_multibyte() {
        let text = "é".repeat(5);
        let chunks = chunk_message(&text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
        assert!(chunk_message("", 2000).is_empty());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(
            parse_retry_after(None, r#"{"message":"slow down","retry_after":1.5,"global":false}"#),
            Duration::from_millis(1500)
        );
        assert_eq!(parse_retry_after(Some("3"), ""), Duration::from_secs(3));
        assert_eq!(parse_retry_after(Some("nope"), "not json"), Duration::from_secs(1));
        assert_eq!(parse_retry_after(Some("100000"), ""), MAX_RETRY_WAIT);
    }

    #[test]
    fn test_message_payload_conversion() {
        let raw = r#"{
            "id": "1190000000000000001",
            "channel_id": "42",
            "content": "hello",
            "timestamp": "2024-01-01T00:00:10.123000+00:00",
            "author": {"id": "7", "username": "someone"}
        }"#;
        let payload: MessagePayload = serde_json::from_str(raw).unwrap();
        let msg = payload.into_chat_message("guild-1");
        assert_eq!(msg.id, "1190000000000000001");
        assert_eq!(msg.space_id, "guild-1");
        assert_eq!(msg.channel_id, "42");
        assert_eq!(msg.author_id, "7");
        assert_eq!(msg.ts, 1_704_067_210);
    }

    #[test]
    fn test_channel_payload_kinds() {
        let raw = r#"[
            {"id": "1", "name": "general", "type": 0},
            {"id": "2", "name": "voice", "type": 2},
            {"id": "3", "type": 4}
        ]"#;
        let channels: Vec<Channel> = serde_json::from_str::<Vec<ChannelPayload>>(raw)
            .unwrap()
            .into_iter()
            .map(Channel::from)
            .collect();
        assert_eq!(channels[0].kind, ChannelKind::Text);
        assert_eq!(channels[1].kind, ChannelKind::Other(2));
        assert_eq!(channels[2].name, "3");
    }

    #[test]
    fn test_new_requires_token() {
        let config = DiscordConfig::default();
        assert!(matches!(
            DiscordClient::new(&config),
            Err(IngestError::Validation(_))
        ));
    }
}
