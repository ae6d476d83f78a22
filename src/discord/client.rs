use crate::config::DiscordConfig;
use crate::discord::types::{
    ApiErrorBody, CreateEmojiRequest, CreateMessageRequest, Embed, GuildEmoji,
    MAX_ANIMATED_EMOJIS_REACHED, MAX_EMOJIS_REACHED,
};
use crate::emoji::{EmojiProvider, ProvisionedEmoji};
use crate::error::{ProvisioningError, RelayError, Result};
use crate::relay::MessageSink;
use crate::transcode::RenderedMessage;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

const API_BASE: &str = "https://discord.com/api/v10";

const MAX_TITLE_CHARS: usize = 256;
const MAX_DESCRIPTION_CHARS: usize = 4096;

pub struct DiscordClient {
    http: Client,
    token: String,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            token: config.bot_token.clone(),
        })
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Download an emote/badge image and wrap it as a data URI
    async fn fetch_asset(&self, url: &str) -> std::result::Result<String, ProvisioningError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProvisioningError::Asset(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ProvisioningError::Asset(format!(
                "{}: {}",
                url,
                response.status()
            )));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/png")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProvisioningError::Asset(format!("{}: {}", url, e)))?;

        if bytes.is_empty() {
            return Err(ProvisioningError::Asset(format!("{}: empty body", url)));
        }

        tracing::debug!(url = %url, mime = %mime, size = bytes.len(), "Fetched emoji asset");
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
    }

    /// Post an embed to a channel
    pub async fn send_message(&self, channel_id: &str, embed: Embed) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/channels/{}/messages", API_BASE, channel_id))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&CreateMessageRequest {
                embeds: vec![embed],
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::DiscordApi(format!(
                "send to {} failed: {} {}",
                channel_id, status, body
            )));
        }
        Ok(())
    }
}

/// Map a failed guild-emoji response to a provisioning error
async fn provisioning_error(guild_id: &str, response: Response) -> ProvisioningError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return ProvisioningError::GuildNotFound(guild_id.to_string());
    }

    let body: Option<ApiErrorBody> = response.json().await.ok();
    match body {
        Some(err) if err.code == MAX_EMOJIS_REACHED || err.code == MAX_ANIMATED_EMOJIS_REACHED => {
            ProvisioningError::QuotaExhausted(guild_id.to_string())
        }
        Some(err) => ProvisioningError::Api(format!("{} ({}): {}", status, err.code, err.message)),
        None => ProvisioningError::Api(status.to_string()),
    }
}

/// Embed carrying a rendered chat message
pub fn build_embed(message: &RenderedMessage, color: u32, now: DateTime<Utc>) -> Embed {
    Embed {
        title: truncate(&message.author_label, MAX_TITLE_CHARS),
        description: truncate(&message.body_text, MAX_DESCRIPTION_CHARS),
        color,
        timestamp: now.to_rfc3339(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl EmojiProvider for DiscordClient {
    async fn find_emoji(
        &self,
        guild_id: &str,
        name: &str,
    ) -> std::result::Result<Option<ProvisionedEmoji>, ProvisioningError> {
        let response = self
            .http
            .get(format!("{}/guilds/{}/emojis", API_BASE, guild_id))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .send()
            .await
            .map_err(|e| ProvisioningError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(provisioning_error(guild_id, response).await);
        }

        let emojis: Vec<GuildEmoji> = response
            .json()
            .await
            .map_err(|e| ProvisioningError::Api(e.to_string()))?;

        Ok(emojis.into_iter().find_map(|e| match (e.id, e.name) {
            (Some(id), Some(n)) if n == name => Some(ProvisionedEmoji {
                id,
                name: n,
                animated: e.animated,
            }),
            _ => None,
        }))
    }

    async fn create_emoji(
        &self,
        guild_id: &str,
        name: &str,
        asset_url: &str,
    ) -> std::result::Result<ProvisionedEmoji, ProvisioningError> {
        let image = self.fetch_asset(asset_url).await?;

        let response = self
            .http
            .post(format!("{}/guilds/{}/emojis", API_BASE, guild_id))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&CreateEmojiRequest { name, image })
            .send()
            .await
            .map_err(|e| ProvisioningError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(provisioning_error(guild_id, response).await);
        }

        let created: GuildEmoji = response
            .json()
            .await
            .map_err(|e| ProvisioningError::Api(e.to_string()))?;

        match created.id {
            Some(id) => Ok(ProvisionedEmoji {
                id,
                name: created.name.unwrap_or_else(|| name.to_string()),
                animated: created.animated,
            }),
            None => Err(ProvisioningError::Api(
                "created emoji has no id".to_string(),
            )),
        }
    }
}

#[async_trait]
impl MessageSink for DiscordClient {
    async fn send_rendered(
        &self,
        channel_id: &str,
        message: &RenderedMessage,
        color: u32,
    ) -> Result<()> {
        self.send_message(channel_id, build_embed(message, color, Utc::now()))
            .await
    }
}
