//! Discord REST payloads

use serde::{Deserialize, Serialize};

/// Guild emoji as returned by `GET /guilds/{id}/emojis`
#[derive(Debug, Clone, Deserialize)]
pub struct GuildEmoji {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateEmojiRequest<'a> {
    pub name: &'a str,
    /// `data:<mime>;base64,<payload>`
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    /// RFC 3339
    pub timestamp: String,
}

/// Error body Discord attaches to 4xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub message: String,
}

/// JSON error code for "Maximum number of emojis reached"
pub const MAX_EMOJIS_REACHED: u64 = 30008;
/// JSON error code for "Maximum number of animated emojis reached"
pub const MAX_ANIMATED_EMOJIS_REACHED: u64 = 30018;
