//! Helix API payloads

use serde::{Deserialize, Serialize};

/// Helix wraps every list response in `{ "data": [...] }`
#[derive(Debug, Clone, Deserialize)]
pub struct HelixData<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixUser {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelixBadgeSet {
    pub set_id: String,
    pub versions: Vec<HelixBadgeVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelixBadgeVersion {
    pub id: String,
    #[serde(default)]
    pub image_url_1x: Option<String>,
    #[serde(default)]
    pub image_url_2x: Option<String>,
    #[serde(default)]
    pub image_url_4x: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelixEmote {
    pub id: String,
    pub name: String,
    pub images: HelixEmoteImages,
    /// Scales this emote is published at ("1.0", "2.0", "3.0")
    #[serde(default)]
    pub scale: Vec<String>,
    #[serde(default)]
    pub format: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelixEmoteImages {
    #[serde(default)]
    pub url_1x: Option<String>,
    #[serde(default)]
    pub url_2x: Option<String>,
    #[serde(default)]
    pub url_4x: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppAccessToken {
    pub access_token: String,
    pub expires_in: u64,
}
