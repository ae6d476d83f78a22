use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Metadata fetch error: {0}")]
    MetadataFetch(String),

    #[error("Emoji provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Message dropped: {0}")]
    RenderDropped(String),

    #[error("Discord API error: {0}")]
    DiscordApi(String),

    #[error("Twitch API error: {0}")]
    TwitchApi(String),

    #[error("IRC error: {0}")]
    Irc(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Reasons a destination emoji could not be looked up or created
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("emoji slots exhausted in guild {0}")]
    QuotaExhausted(String),

    #[error("emoji asset unavailable: {0}")]
    Asset(String),

    #[error("emoji guild not found: {0}")]
    GuildNotFound(String),

    #[error("{0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
