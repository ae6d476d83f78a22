//! Emoji keys and provisioned emoji references

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::LazyLock;

/// Prefix for badges and emotes shared by every Twitch channel
pub const GLOBAL_PREFIX: &str = "twitch";

/// Discord emoji names must be 2-32 characters
const MAX_NAME_LEN: usize = 32;
const MIN_NAME_LEN: usize = 2;

/// Hex digits of the key hash appended to names that had to be shortened
const HASH_SUFFIX_LEN: usize = 6;

static ILLEGAL_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid emoji name pattern"));

/// Where a badge or emote comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Global,
    Channel(String),
}

impl Namespace {
    /// Pick the namespace for a definition seen in `channel`
    pub fn for_definition(channel: &str, is_channel_specific: bool) -> Self {
        if is_channel_specific {
            Self::Channel(channel.to_string())
        } else {
            Self::Global
        }
    }

    pub fn prefix(&self) -> &str {
        match self {
            Self::Global => GLOBAL_PREFIX,
            Self::Channel(channel) => channel,
        }
    }
}

/// Identifies one destination emoji slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmojiKey {
    namespace: Namespace,
    name: String,
    version: Option<String>,
}

impl EmojiKey {
    pub fn badge(namespace: Namespace, set_id: &str, version: &str) -> Self {
        Self {
            namespace,
            name: set_id.to_string(),
            version: Some(version.to_string()),
        }
    }

    pub fn emote(namespace: Namespace, name: &str) -> Self {
        Self {
            namespace,
            name: name.to_string(),
            version: None,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Name used when looking up or creating the emoji in the guild
    ///
    /// Names longer than Discord allows keep their head and end in a hash of
    /// the full key, so two long keys sharing a prefix stay distinct.
    pub fn emoji_name(&self) -> String {
        let raw = format!(
            "{}{}{}",
            self.namespace.prefix(),
            self.name,
            self.version.as_deref().unwrap_or_default()
        );
        let cleaned = ILLEGAL_NAME_CHARS.replace_all(&raw, "_");
        if cleaned.chars().count() <= MAX_NAME_LEN {
            return sanitize_emoji_name(&raw);
        }

        let digest = hex::encode(Sha256::digest(self.to_string().as_bytes()));
        let head: String = cleaned
            .chars()
            .take(MAX_NAME_LEN - HASH_SUFFIX_LEN - 1)
            .collect();
        format!("{}_{}", head, &digest[..HASH_SUFFIX_LEN])
    }
}

impl fmt::Display for EmojiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace.prefix(), self.name)?;
        if let Some(version) = &self.version {
            write!(f, "/{}", version)?;
        }
        Ok(())
    }
}

/// Replace characters Discord rejects in emoji names and clamp the length
pub fn sanitize_emoji_name(raw: &str) -> String {
    let mut name: String = ILLEGAL_NAME_CHARS
        .replace_all(raw, "_")
        .chars()
        .take(MAX_NAME_LEN)
        .collect();
    while name.len() < MIN_NAME_LEN {
        name.push('_');
    }
    name
}

/// Reference to an emoji owned by the destination guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedEmoji {
    pub id: String,
    pub name: String,
    pub animated: bool,
}

impl ProvisionedEmoji {
    /// Discord custom emoji markup, e.g. `<:twitchKappa:123>` or `<a:name:123>`
    pub fn tag(&self) -> String {
        let animated = if self.animated { "a" } else { "" };
        format!("<{}:{}:{}>", animated, self.name, self.id)
    }
}
