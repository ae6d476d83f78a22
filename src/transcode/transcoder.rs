//! Rewrites Twitch chat lines into Discord-ready text

use crate::emoji::{EmojiCache, EmojiKey, Namespace};
use crate::metadata::{ChannelMetadata, best_image};
use crate::transcode::{
    BadgeRef, EmoteRange, InlineEmotes, RenderedMessage, plan_ranges, splice_descending,
};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Renders badges and inline emotes as destination emoji
///
/// Rendering never fails: a badge or emote that cannot be resolved is left
/// out (badges) or left as its original text (emotes).
pub struct Transcoder {
    emoji: Arc<EmojiCache>,
}

impl Transcoder {
    pub fn new(emoji: Arc<EmojiCache>) -> Self {
        Self { emoji }
    }

    pub async fn render(
        &self,
        metadata: &ChannelMetadata,
        author_name: &str,
        badges: &[BadgeRef],
        text: &str,
        emotes: &InlineEmotes,
    ) -> RenderedMessage {
        let author_label = self.author_label(metadata, author_name, badges).await;
        let body_text = self.body_text(metadata, text, emotes).await;

        RenderedMessage {
            author_label,
            body_text,
        }
    }

    /// Badge emoji in the order the author holds them, then the name
    async fn author_label(
        &self,
        metadata: &ChannelMetadata,
        author_name: &str,
        badges: &[BadgeRef],
    ) -> String {
        let tags = join_all(badges.iter().map(|b| self.badge_tag(metadata, b))).await;

        let mut label: String = tags.into_iter().flatten().collect();
        label.push_str(author_name);
        label
    }

    async fn badge_tag(&self, metadata: &ChannelMetadata, badge: &BadgeRef) -> Option<String> {
        let Some(definition) = metadata.badge(&badge.set_id) else {
            tracing::debug!(badge = %badge.set_id, "Unknown badge set, skipping");
            return None;
        };
        let Some(version) = definition.version(&badge.version) else {
            tracing::debug!(
                badge = %badge.set_id,
                version = %badge.version,
                "Unknown badge version, skipping"
            );
            return None;
        };
        let url = best_image(&version.images)?;

        let key = EmojiKey::badge(
            Namespace::for_definition(&metadata.channel, definition.is_channel_specific),
            &definition.set_id,
            &badge.version,
        );
        match self.emoji.resolve(&key, url).await {
            Ok(emoji) => Some(emoji.tag()),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Badge emoji unavailable, omitting");
                None
            }
        }
    }

    async fn body_text(
        &self,
        metadata: &ChannelMetadata,
        text: &str,
        emotes: &InlineEmotes,
    ) -> String {
        if emotes.is_empty() {
            return text.to_string();
        }

        let plan = plan_ranges(text, emotes);

        // Resolve each distinct emote once, concurrently
        let ids: BTreeSet<&str> = plan.iter().map(|(_, id)| *id).collect();
        let tags: HashMap<&str, String> = join_all(
            ids.into_iter()
                .map(|id| async move { (id, self.emote_tag(metadata, id).await) }),
        )
        .await
        .into_iter()
        .filter_map(|(id, tag)| tag.map(|t| (id, t)))
        .collect();

        let replacements: Vec<(EmoteRange, String)> = plan
            .into_iter()
            .filter_map(|(range, id)| tags.get(id).map(|tag| (range, tag.clone())))
            .collect();

        splice_descending(text, &replacements)
    }

    async fn emote_tag(&self, metadata: &ChannelMetadata, id: &str) -> Option<String> {
        let Some(emote) = metadata.emote(id) else {
            tracing::debug!(emote_id = %id, "Unknown emote, leaving text untouched");
            return None;
        };
        let url = emote.best_image()?;

        let key = EmojiKey::emote(
            Namespace::for_definition(&metadata.channel, emote.is_channel_specific),
            &emote.name,
        );
        match self.emoji.resolve(&key, url).await {
            Ok(emoji) => Some(emoji.tag()),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Emote emoji unavailable, leaving text");
                None
            }
        }
    }

    /// Replace whole words matching known emote names
    ///
    /// For text that arrives without range metadata.
    pub async fn substitute_by_name(&self, metadata: &ChannelMetadata, text: &str) -> String {
        let mut resolved: HashMap<&str, Option<String>> = HashMap::new();
        let mut words = Vec::new();

        for word in text.split(' ') {
            if !resolved.contains_key(word) {
                let tag = match metadata.emote_by_name(word) {
                    Some(emote) => self.emote_tag(metadata, &emote.id).await,
                    None => None,
                };
                resolved.insert(word, tag);
            }
            match resolved.get(word).and_then(Option::as_deref) {
                Some(tag) => words.push(tag.to_string()),
                None => words.push(word.to_string()),
            }
        }

        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisioningError;
    use crate::testing::{FakeEmojiProvider, badge_set, emote};

    fn metadata() -> ChannelMetadata {
        ChannelMetadata::new(
            "somestreamer",
            "1001",
            &[badge_set("subscriber", &["0", "3"])],
            &[
                badge_set("broadcaster", &["1"]),
                badge_set("subscriber", &["0"]),
                badge_set("glhf-pledge", &["1"]),
            ],
            &[emote("emotesv2_hype", "someHype", &["1.0", "2.0", "3.0"])],
            &[
                emote("25", "Kappa", &["1.0", "2.0"]),
                emote("1902", "Keepo", &["1.0", "2.0", "3.0"]),
            ],
        )
    }

    fn transcoder() -> (Arc<FakeEmojiProvider>, Transcoder) {
        let provider = Arc::new(FakeEmojiProvider::new());
        let cache = Arc::new(EmojiCache::new(provider.clone(), "guild"));
        (provider, Transcoder::new(cache))
    }

    fn ranges(entries: &[(&str, usize, usize)]) -> InlineEmotes {
        let mut emotes = InlineEmotes::new();
        for (id, start, end) in entries {
            emotes
                .entry(id.to_string())
                .or_default()
                .push(EmoteRange::new(*start, *end));
        }
        emotes
    }

    #[tokio::test]
    async fn test_global_emote_uses_2x_image() {
        let (provider, transcoder) = transcoder();

        let rendered = transcoder
            .render(
                &metadata(),
                "viewer",
                &[],
                "Kappa is great",
                &ranges(&[("25", 0, 4)]),
            )
            .await;

        let id = provider.id_for("twitchKappa");
        assert_eq!(rendered.body_text, format!("<:twitchKappa:{}> is great", id));
        assert_eq!(provider.requested_assets(), vec!["https://cdn/25/2.0"]);
    }

    #[tokio::test]
    async fn test_global_badge_in_author_label() {
        let (provider, transcoder) = transcoder();

        let rendered = transcoder
            .render(
                &metadata(),
                "username",
                &[BadgeRef::new("broadcaster", "1")],
                "hello",
                &InlineEmotes::new(),
            )
            .await;

        let id = provider.id_for("twitchbroadcaster1");
        assert_eq!(
            rendered.author_label,
            format!("<:twitchbroadcaster1:{}>username", id)
        );
        assert_eq!(rendered.body_text, "hello");
        assert_eq!(
            provider.requested_assets(),
            vec!["https://badges/broadcaster/1/3"]
        );
    }

    #[tokio::test]
    async fn test_badges_keep_event_order_and_skip_unknown() {
        let (provider, transcoder) = transcoder();

        let rendered = transcoder
            .render(
                &metadata(),
                "fan",
                &[
                    BadgeRef::new("subscriber", "3"),
                    BadgeRef::new("subscriber", "99"),
                    BadgeRef::new("premium", "1"),
                    BadgeRef::new("glhf-pledge", "1"),
                ],
                "hi",
                &InlineEmotes::new(),
            )
            .await;

        assert_eq!(
            rendered.author_label,
            format!(
                "<:somestreamersubscriber3:{}><:twitchglhf_pledge1:{}>fan",
                provider.id_for("somestreamersubscriber3"),
                provider.id_for("twitchglhf_pledge1"),
            )
        );
    }

    #[tokio::test]
    async fn test_unknown_emote_left_untouched() {
        let (provider, transcoder) = transcoder();

        let rendered = transcoder
            .render(
                &metadata(),
                "viewer",
                &[],
                "Kappa NotReal",
                &ranges(&[("25", 0, 4), ("404", 6, 12)]),
            )
            .await;

        assert_eq!(
            rendered.body_text,
            format!("<:twitchKappa:{}> NotReal", provider.id_for("twitchKappa"))
        );
    }

    #[tokio::test]
    async fn test_provisioning_failure_keeps_original_text() {
        let (provider, transcoder) = transcoder();
        provider.fail_with(ProvisioningError::Asset("timeout".to_string()));

        let rendered = transcoder
            .render(
                &metadata(),
                "viewer",
                &[BadgeRef::new("broadcaster", "1")],
                "Kappa Keepo",
                &ranges(&[("25", 0, 4), ("1902", 6, 10)]),
            )
            .await;

        assert_eq!(rendered.author_label, "viewer");
        assert_eq!(rendered.body_text, "Kappa Keepo");
    }

    #[tokio::test]
    async fn test_repeated_emote_and_channel_emote() {
        let (provider, transcoder) = transcoder();

        let rendered = transcoder
            .render(
                &metadata(),
                "viewer",
                &[],
                "Kappa someHype Kappa",
                &ranges(&[("25", 0, 4), ("25", 15, 19), ("emotesv2_hype", 6, 13)]),
            )
            .await;

        let kappa = provider.id_for("twitchKappa");
        let hype = provider.id_for("somestreamersomeHype");
        assert_eq!(
            rendered.body_text,
            format!("<:twitchKappa:{k}> <:somestreamersomeHype:{h}> <:twitchKappa:{k}>", k = kappa, h = hype)
        );
        assert_eq!(provider.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_substitute_by_name() {
        let (provider, transcoder) = transcoder();

        let body = transcoder
            .substitute_by_name(&metadata(), "Kappa Kappa notKappa Keepo")
            .await;

        assert_eq!(
            body,
            format!(
                "<:twitchKappa:{k}> <:twitchKappa:{k}> notKappa <:twitchKeepo:{p}>",
                k = provider.id_for("twitchKappa"),
                p = provider.id_for("twitchKeepo"),
            )
        );
    }
}
