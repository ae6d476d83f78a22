//! Twitch: chat transport and Helix metadata API

mod backoff;
mod helix;
mod irc;
mod types;

pub use backoff::ExponentialBackoff;
pub use helix::HelixClient;
pub use irc::{IrcMessage, TwitchChat, parse_badges};
pub use types::{
    AppAccessToken, HelixBadgeSet, HelixBadgeVersion, HelixData, HelixEmote, HelixEmoteImages,
    HelixUser,
};
