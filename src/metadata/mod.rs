//! Per-channel badge and emote metadata
//!
//! Key features:
//! - Lazy-loading: a channel is fetched on its first relayed message
//! - Single flight: concurrent first messages share one fetch
//! - No partial entries: a failed fetch leaves the channel unpopulated
//! - Never invalidated within a run

mod cache;
mod source;
mod types;

pub use cache::{CacheStats, ChannelMetadataCache};
pub use source::MetadataSource;
pub use types::{
    BadgeDefinition, BadgeVersion, ChannelMetadata, EmoteDefinition, ImageScale, ImageSet,
    best_image,
};
