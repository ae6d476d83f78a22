//! In-memory collaborators for unit tests

use crate::emoji::{EmojiProvider, ProvisionedEmoji};
use crate::error::{ProvisioningError, RelayError, Result};
use crate::metadata::MetadataSource;
use crate::relay::{ChannelDirectory, MessageSink};
use crate::transcode::RenderedMessage;
use crate::twitch::{HelixBadgeSet, HelixBadgeVersion, HelixEmote, HelixEmoteImages};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub fn badge_set(set_id: &str, versions: &[&str]) -> HelixBadgeSet {
    HelixBadgeSet {
        set_id: set_id.to_string(),
        versions: versions
            .iter()
            .map(|v| HelixBadgeVersion {
                id: v.to_string(),
                image_url_1x: Some(format!("https://badges/{}/{}/1", set_id, v)),
                image_url_2x: Some(format!("https://badges/{}/{}/2", set_id, v)),
                image_url_4x: Some(format!("https://badges/{}/{}/3", set_id, v)),
                title: None,
            })
            .collect(),
    }
}

pub fn emote(id: &str, name: &str, scales: &[&str]) -> HelixEmote {
    HelixEmote {
        id: id.to_string(),
        name: name.to_string(),
        images: HelixEmoteImages {
            url_1x: Some(format!("https://cdn/{}/1.0", id)),
            url_2x: Some(format!("https://cdn/{}/2.0", id)),
            url_4x: Some(format!("https://cdn/{}/3.0", id)),
        },
        scale: scales.iter().map(|s| s.to_string()).collect(),
        format: vec!["static".to_string()],
    }
}

/// Guild emoji store that counts creation calls
#[derive(Default)]
pub struct FakeEmojiProvider {
    guild: Mutex<HashMap<String, ProvisionedEmoji>>,
    create_calls: AtomicUsize,
    assets: Mutex<Vec<String>>,
    failure: Mutex<Option<ProvisioningError>>,
    latency: Option<Duration>,
}

impl FakeEmojiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Id the fake assigns to a created emoji
    pub fn id_for(&self, name: &str) -> String {
        format!("id{}", name)
    }

    pub fn insert_existing(&self, emoji: ProvisionedEmoji) {
        self.guild
            .lock()
            .unwrap()
            .insert(emoji.name.clone(), emoji);
    }

    /// Make every following creation fail
    pub fn fail_with(&self, error: ProvisioningError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn requested_assets(&self) -> Vec<String> {
        self.assets.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmojiProvider for FakeEmojiProvider {
    async fn find_emoji(
        &self,
        _guild_id: &str,
        name: &str,
    ) -> std::result::Result<Option<ProvisionedEmoji>, ProvisioningError> {
        Ok(self.guild.lock().unwrap().get(name).cloned())
    }

    async fn create_emoji(
        &self,
        _guild_id: &str,
        name: &str,
        asset_url: &str,
    ) -> std::result::Result<ProvisionedEmoji, ProvisioningError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.assets.lock().unwrap().push(asset_url.to_string());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }

        let emoji = ProvisionedEmoji {
            id: self.id_for(name),
            name: name.to_string(),
            animated: false,
        };
        self.insert_existing(emoji.clone());
        Ok(emoji)
    }
}

/// Helix stand-in serving fixed badges and emotes
pub struct FakeMetadataSource {
    channel_badges: Vec<HelixBadgeSet>,
    global_badges: Vec<HelixBadgeSet>,
    channel_emotes: Vec<HelixEmote>,
    global_emotes: Vec<HelixEmote>,
    failing: AtomicBool,
    latency: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeMetadataSource {
    pub fn with_defaults() -> Self {
        Self {
            channel_badges: vec![badge_set("subscriber", &["0", "3"])],
            global_badges: vec![
                badge_set("broadcaster", &["1"]),
                badge_set("moderator", &["1"]),
                badge_set("subscriber", &["0"]),
            ],
            channel_emotes: vec![emote("emotesv2_hype", "someHype", &["1.0", "2.0", "3.0"])],
            global_emotes: vec![
                emote("25", "Kappa", &["1.0", "2.0"]),
                emote("1902", "Keepo", &["1.0", "2.0", "3.0"]),
            ],
            failing: AtomicBool::new(false),
            latency: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Simulate the Helix API being unreachable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn user_lookups(&self) -> usize {
        self.call_log()
            .iter()
            .filter(|c| c.starts_with("users:"))
            .count()
    }

    async fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::TwitchApi("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataSource for FakeMetadataSource {
    async fn get_user_id(&self, login: &str) -> Result<String> {
        self.record(format!("users:{}", login)).await?;
        Ok("1001".to_string())
    }

    async fn get_channel_badges(&self, user_id: &str) -> Result<Vec<HelixBadgeSet>> {
        self.record(format!("channel_badges:{}", user_id)).await?;
        Ok(self.channel_badges.clone())
    }

    async fn get_global_badges(&self) -> Result<Vec<HelixBadgeSet>> {
        self.record("global_badges".to_string()).await?;
        Ok(self.global_badges.clone())
    }

    async fn get_channel_emotes(&self, user_id: &str) -> Result<Vec<HelixEmote>> {
        self.record(format!("channel_emotes:{}", user_id)).await?;
        Ok(self.channel_emotes.clone())
    }

    async fn get_global_emotes(&self) -> Result<Vec<HelixEmote>> {
        self.record("global_emotes".to_string()).await?;
        Ok(self.global_emotes.clone())
    }
}

/// Sink that keeps every delivered message
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, RenderedMessage, u32)>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(String, RenderedMessage, u32)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send_rendered(
        &self,
        channel_id: &str,
        message: &RenderedMessage,
        color: u32,
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::DiscordApi("500 Internal Server Error".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message.clone(), color));
        Ok(())
    }
}

/// Fixed channel mapping
pub struct StaticDirectory(HashMap<String, String>);

impl StaticDirectory {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(s, d)| (s.to_string(), d.to_string()))
                .collect(),
        )
    }
}

#[async_trait]
impl ChannelDirectory for StaticDirectory {
    async fn destination_channel(&self, source_channel: &str) -> Option<String> {
        self.0.get(source_channel).cloned()
    }
}
