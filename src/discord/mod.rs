//! Discord REST client: guild emoji and channel messages

mod client;
mod types;

pub use client::{DiscordClient, build_embed};
pub use types::{CreateMessageRequest, Embed, GuildEmoji};
