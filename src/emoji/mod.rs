//! Destination emoji provisioning
//!
//! Maps badge/emote keys to Discord custom emoji, creating each one at most
//! once per process. Concurrent lookups of the same missing key share a
//! single creation call.

mod cache;
mod provider;
mod types;

pub use cache::{EmojiCache, EmojiStats};
pub use provider::EmojiProvider;
pub use types::{EmojiKey, GLOBAL_PREFIX, Namespace, ProvisionedEmoji, sanitize_emoji_name};
