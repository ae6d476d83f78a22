use crate::transcode::BadgeRef;

/// Embed color used when the author has none set
pub const DEFAULT_COLOR: u32 = 0xFFFFFF;

/// Per-message author state delivered with a chat line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContext {
    /// Login name of the author
    pub username: String,
    /// `#RRGGBB`, absent when the author never picked one
    pub color: Option<String>,
    /// Badges in the order the platform sent them
    pub badges: Vec<BadgeRef>,
    /// Raw emote ranges tag (`id:start-end,.../id:...`), code point indexed
    ///
    /// `None` when the transport sent no emote metadata at all; emote names
    /// are then matched in the text instead.
    pub emotes: Option<String>,
}

/// One incoming chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Channel as sent by the transport, possibly with `#`
    pub channel: String,
    pub context: MessageContext,
    pub text: String,
}

/// Result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent,
    IgnoredSelf,
    IgnoredCommand,
    Unmapped,
    Dropped,
}

/// Channel key used everywhere: no `#` sigil, lowercase
pub fn normalize_channel(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_lowercase()
}

/// Parse `#RRGGBB` into a numeric color, white when absent or invalid
pub fn parse_color(color: Option<&str>) -> u32 {
    color
        .map(|c| c.trim().trim_start_matches('#'))
        .filter(|c| c.len() == 6)
        .and_then(|c| u32::from_str_radix(c, 16).ok())
        .unwrap_or(DEFAULT_COLOR)
}
