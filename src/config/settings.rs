use crate::error::{RelayError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub twitch: TwitchConfig,
    pub discord: DiscordConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Bot login; `None` joins chat anonymously (read-only)
    pub bot_username: Option<String>,
    pub oauth_token: Option<String>,
    pub irc_addr: String,
    /// Plaintext IRC only when explicitly disabled
    pub irc_tls: bool,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Guild that owns every provisioned emoji
    pub emoji_guild_id: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub channel_map_path: PathBuf,
    /// Prefix of operator console commands (`[link ...`)
    pub command_prefix: String,
    /// Twitch chat lines starting with this are not relayed; unset relays everything
    pub ignore_prefix: Option<String>,
    pub http_timeout: Duration,
    pub stats_interval: Duration,
}

pub fn load_settings() -> Result<Settings> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    parse_settings(&std::env::vars().collect())
}

/// Build settings from a variable map so tests don't touch the process env
pub fn parse_settings(vars: &HashMap<String, String>) -> Result<Settings> {
    let required = |key: &str| {
        vars.get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| RelayError::Config(format!("{} not set", key)))
    };
    let optional = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();
    let number = |key: &str, default: u64| -> Result<u64> {
        optional(key)
            .map(|v| {
                v.parse()
                    .map_err(|_| RelayError::Config(format!("Invalid {}", key)))
            })
            .unwrap_or(Ok(default))
    };

    let irc_tls = match optional("TWITCH_IRC_TLS").as_deref() {
        None => true,
        Some("1" | "true" | "yes") => true,
        Some("0" | "false" | "no") => false,
        Some(_) => return Err(RelayError::Config("Invalid TWITCH_IRC_TLS".to_string())),
    };
    let default_port = if irc_tls { 6697 } else { 6667 };

    let twitch = TwitchConfig {
        client_id: required("TWITCH_CLIENT_ID")?,
        client_secret: required("TWITCH_CLIENT_SECRET")?,
        bot_username: optional("TWITCH_BOT_USERNAME").map(|u| u.to_lowercase()),
        oauth_token: optional("TWITCH_OAUTH_TOKEN"),
        irc_addr: optional("TWITCH_IRC_ADDR")
            .unwrap_or_else(|| format!("irc.chat.twitch.tv:{}", default_port)),
        irc_tls,
    };

    if twitch.bot_username.is_some() && twitch.oauth_token.is_none() {
        return Err(RelayError::Config(
            "TWITCH_OAUTH_TOKEN is required when TWITCH_BOT_USERNAME is set".to_string(),
        ));
    }

    let discord = DiscordConfig {
        bot_token: required("DISCORD_BOT_TOKEN")?,
        emoji_guild_id: required("DISCORD_EMOJI_GUILD_ID")?,
    };

    let relay = RelayConfig {
        channel_map_path: optional("CHANNEL_MAP_PATH")
            .unwrap_or_else(|| {
                let home = vars.get("HOME").cloned().unwrap_or_else(|| ".".to_string());
                format!("{}/.twitch_relay/channels.json", home)
            })
            .into(),
        command_prefix: optional("COMMAND_PREFIX").unwrap_or_else(|| "[".to_string()),
        ignore_prefix: optional("TWITCH_IGNORE_PREFIX"),
        http_timeout: Duration::from_secs(number("HTTP_TIMEOUT_SECS", 10)?),
        stats_interval: Duration::from_secs(number("STATS_INTERVAL_SECS", 300)?),
    };

    Ok(Settings {
        twitch,
        discord,
        relay,
    })
}
