use crate::error::Result;
use crate::transcode::RenderedMessage;
use async_trait::async_trait;

/// Destination platform message delivery
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_rendered(
        &self,
        channel_id: &str,
        message: &RenderedMessage,
        color: u32,
    ) -> Result<()>;
}

/// Source channel -> destination channel mapping
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Destination channel currently linked to `source_channel`
    async fn destination_channel(&self, source_channel: &str) -> Option<String>;
}
