use crate::emoji::ProvisionedEmoji;
use crate::error::ProvisioningError;
use async_trait::async_trait;

/// Destination platform operations needed to provision emoji
#[async_trait]
pub trait EmojiProvider: Send + Sync {
    /// Look for an emoji with exactly this name in the guild
    async fn find_emoji(
        &self,
        guild_id: &str,
        name: &str,
    ) -> Result<Option<ProvisionedEmoji>, ProvisioningError>;

    /// Upload the image at `asset_url` as a new guild emoji
    async fn create_emoji(
        &self,
        guild_id: &str,
        name: &str,
        asset_url: &str,
    ) -> Result<ProvisionedEmoji, ProvisioningError>;
}
