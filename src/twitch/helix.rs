//! Twitch Helix API client for badge and emote metadata

use crate::config::TwitchConfig;
use crate::error::{RelayError, Result};
use crate::metadata::MetadataSource;
use crate::twitch::{AppAccessToken, HelixBadgeSet, HelixData, HelixEmote, HelixUser};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const HELIX_BASE: &str = "https://api.twitch.tv/helix";
const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Refresh the app token this long before Twitch says it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct HelixClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<CachedToken>>,
}

impl HelixClient {
    pub fn new(config: &TwitchConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: RwLock::new(None),
        })
    }

    /// App access token via the client-credentials grant, cached until expiry
    async fn access_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref() {
                if token.expires_at > Instant::now() {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut slot = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Requesting Twitch app access token");
        let response = self
            .http
            .post(TOKEN_URL)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RelayError::TwitchApi(format!(
                "token request failed: {}",
                response.status()
            )));
        }

        let token: AppAccessToken = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        tracing::info!(expires_in_secs = token.expires_in, "Obtained Twitch app access token");

        *slot = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<T>> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(format!("{}/{}", HELIX_BASE, path))
            .query(query)
            .header("Client-Id", &self.client_id)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: HelixData<T> = response.json().await?;
                tracing::debug!(path = %path, items = body.data.len(), "Helix request succeeded");
                Ok(body.data)
            }
            StatusCode::UNAUTHORIZED => {
                // Force a fresh token on the next request
                *self.token.write().await = None;
                Err(RelayError::TwitchApi(format!("{}: unauthorized", path)))
            }
            status => Err(RelayError::TwitchApi(format!("{}: {}", path, status))),
        }
    }
}

#[async_trait]
impl MetadataSource for HelixClient {
    async fn get_user_id(&self, login: &str) -> Result<String> {
        let users: Vec<HelixUser> = self.get("users", &[("login", login)]).await?;

        users
            .into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| RelayError::MetadataFetch(format!("channel {} does not exist", login)))
    }

    async fn get_channel_badges(&self, user_id: &str) -> Result<Vec<HelixBadgeSet>> {
        self.get("chat/badges", &[("broadcaster_id", user_id)]).await
    }

    async fn get_global_badges(&self) -> Result<Vec<HelixBadgeSet>> {
        self.get("chat/badges/global", &[]).await
    }

    async fn get_channel_emotes(&self, user_id: &str) -> Result<Vec<HelixEmote>> {
        self.get("chat/emotes", &[("broadcaster_id", user_id)]).await
    }

    async fn get_global_emotes(&self) -> Result<Vec<HelixEmote>> {
        self.get("chat/emotes/global", &[]).await
    }
}
