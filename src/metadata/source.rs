use crate::error::Result;
use crate::twitch::{HelixBadgeSet, HelixEmote};
use async_trait::async_trait;

/// Source platform metadata lookups
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Resolve a channel login to the platform user id
    async fn get_user_id(&self, login: &str) -> Result<String>;

    async fn get_channel_badges(&self, user_id: &str) -> Result<Vec<HelixBadgeSet>>;

    async fn get_global_badges(&self) -> Result<Vec<HelixBadgeSet>>;

    async fn get_channel_emotes(&self, user_id: &str) -> Result<Vec<HelixEmote>>;

    async fn get_global_emotes(&self) -> Result<Vec<HelixEmote>>;
}
