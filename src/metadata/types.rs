//! Badge and emote definitions cached per channel

use crate::twitch::{HelixBadgeSet, HelixBadgeVersion, HelixEmote};
use std::collections::{BTreeMap, HashMap};

/// Image resolutions published by Twitch, ordered smallest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageScale {
    X1,
    X2,
    X4,
}

impl ImageScale {
    /// Map a Helix `scale` entry ("1.0", "2.0", "3.0")
    pub fn from_helix(scale: &str) -> Option<Self> {
        match scale {
            "1.0" => Some(Self::X1),
            "2.0" => Some(Self::X2),
            "3.0" => Some(Self::X4),
            _ => None,
        }
    }
}

/// Image URLs keyed by scale
pub type ImageSet = BTreeMap<ImageScale, String>;

/// Largest available image: 4x, then 2x, then 1x
pub fn best_image(images: &ImageSet) -> Option<&str> {
    images.values().next_back().map(String::as_str)
}

fn image_set(urls: [(ImageScale, Option<&String>); 3]) -> ImageSet {
    urls.into_iter()
        .filter_map(|(scale, url)| {
            url.filter(|u| !u.is_empty())
                .map(|u| (scale, u.clone()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct BadgeVersion {
    pub id: String,
    pub images: ImageSet,
}

impl From<&HelixBadgeVersion> for BadgeVersion {
    fn from(version: &HelixBadgeVersion) -> Self {
        Self {
            id: version.id.clone(),
            images: image_set([
                (ImageScale::X1, version.image_url_1x.as_ref()),
                (ImageScale::X2, version.image_url_2x.as_ref()),
                (ImageScale::X4, version.image_url_4x.as_ref()),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BadgeDefinition {
    pub set_id: String,
    /// Versions flattened from the Helix list, keyed by version id
    pub versions: HashMap<String, BadgeVersion>,
    pub is_channel_specific: bool,
}

impl BadgeDefinition {
    pub fn from_helix(set: &HelixBadgeSet, is_channel_specific: bool) -> Self {
        Self {
            set_id: set.set_id.clone(),
            versions: set
                .versions
                .iter()
                .map(|v| (v.id.clone(), BadgeVersion::from(v)))
                .collect(),
            is_channel_specific,
        }
    }

    pub fn version(&self, id: &str) -> Option<&BadgeVersion> {
        self.versions.get(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmoteDefinition {
    pub id: String,
    pub name: String,
    /// Only the scales the emote advertises
    pub images: ImageSet,
    pub is_channel_specific: bool,
}

impl EmoteDefinition {
    pub fn from_helix(emote: &HelixEmote, is_channel_specific: bool) -> Self {
        let advertised = |scale: ImageScale| {
            emote
                .scale
                .iter()
                .any(|s| ImageScale::from_helix(s) == Some(scale))
        };
        let urls = [
            (ImageScale::X1, emote.images.url_1x.as_ref()),
            (ImageScale::X2, emote.images.url_2x.as_ref()),
            (ImageScale::X4, emote.images.url_4x.as_ref()),
        ];

        let mut images = image_set(urls.map(|(scale, url)| (scale, url.filter(|_| advertised(scale)))));
        // No scale list at all still leaves the 1x image usable
        if images.is_empty() {
            if let Some(url) = emote.images.url_1x.as_ref() {
                images.insert(ImageScale::X1, url.clone());
            }
        }

        Self {
            id: emote.id.clone(),
            name: emote.name.clone(),
            images,
            is_channel_specific,
        }
    }

    pub fn best_image(&self) -> Option<&str> {
        best_image(&self.images)
    }
}

/// Everything needed to render messages from one source channel
#[derive(Debug, Clone)]
pub struct ChannelMetadata {
    /// Channel login without `#`
    pub channel: String,

    /// Helix user id of the broadcaster
    pub broadcaster_id: String,

    channel_badges: HashMap<String, BadgeDefinition>,
    global_badges: HashMap<String, BadgeDefinition>,

    channel_emotes: HashMap<String, EmoteDefinition>,
    global_emotes: HashMap<String, EmoteDefinition>,

    /// Emote name -> id, channel emotes shadowing globals
    emote_ids_by_name: HashMap<String, String>,
}

impl ChannelMetadata {
    pub fn new(
        channel: impl Into<String>,
        broadcaster_id: impl Into<String>,
        channel_badges: &[HelixBadgeSet],
        global_badges: &[HelixBadgeSet],
        channel_emotes: &[HelixEmote],
        global_emotes: &[HelixEmote],
    ) -> Self {
        let badges = |sets: &[HelixBadgeSet], is_channel_specific| {
            sets.iter()
                .map(|s| {
                    (
                        s.set_id.clone(),
                        BadgeDefinition::from_helix(s, is_channel_specific),
                    )
                })
                .collect::<HashMap<_, _>>()
        };
        let emotes = |list: &[HelixEmote], is_channel_specific| {
            list.iter()
                .map(|e| (e.id.clone(), EmoteDefinition::from_helix(e, is_channel_specific)))
                .collect::<HashMap<_, _>>()
        };

        let channel_emotes = emotes(channel_emotes, true);
        let global_emotes = emotes(global_emotes, false);

        let mut emote_ids_by_name: HashMap<String, String> = global_emotes
            .values()
            .map(|e| (e.name.clone(), e.id.clone()))
            .collect();
        emote_ids_by_name.extend(
            channel_emotes
                .values()
                .map(|e| (e.name.clone(), e.id.clone())),
        );

        Self {
            channel: channel.into(),
            broadcaster_id: broadcaster_id.into(),
            channel_badges: badges(channel_badges, true),
            global_badges: badges(global_badges, false),
            channel_emotes,
            global_emotes,
            emote_ids_by_name,
        }
    }

    /// Channel badge if the channel defines one, else the global badge
    pub fn badge(&self, set_id: &str) -> Option<&BadgeDefinition> {
        self.channel_badges
            .get(set_id)
            .or_else(|| self.global_badges.get(set_id))
    }

    pub fn emote(&self, id: &str) -> Option<&EmoteDefinition> {
        self.channel_emotes
            .get(id)
            .or_else(|| self.global_emotes.get(id))
    }

    pub fn emote_by_name(&self, name: &str) -> Option<&EmoteDefinition> {
        self.emote_ids_by_name
            .get(name)
            .and_then(|id| self.emote(id))
    }

    /// (badge sets, emotes) counts for logging
    pub fn sizes(&self) -> (usize, usize) {
        (
            self.channel_badges.len() + self.global_badges.len(),
            self.channel_emotes.len() + self.global_emotes.len(),
        )
    }
}
