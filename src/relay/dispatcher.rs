use crate::error::RelayError;
use crate::logging::{Timer, log_error, preview};
use crate::metadata::ChannelMetadataCache;
use crate::relay::{
    ChannelDirectory, ChatEvent, MessageSink, RelayOutcome, normalize_channel, parse_color,
};
use crate::transcode::{InlineEmotes, Transcoder, parse_emote_ranges};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Drives one chat event through metadata loading, rendering and delivery
///
/// Delivery is at-most-once: a message whose channel metadata cannot be
/// loaded, or whose send fails, is logged and discarded.
pub struct RelayDispatcher {
    metadata: Arc<ChannelMetadataCache>,
    transcoder: Transcoder,
    sink: Arc<dyn MessageSink>,
    directory: Arc<dyn ChannelDirectory>,
    /// Our own chat login, if logged in
    bot_username: Option<String>,
    /// Chat lines starting with this belong to a chat-side command bot
    ignore_prefix: Option<String>,
}

impl RelayDispatcher {
    pub fn new(
        metadata: Arc<ChannelMetadataCache>,
        transcoder: Transcoder,
        sink: Arc<dyn MessageSink>,
        directory: Arc<dyn ChannelDirectory>,
        bot_username: Option<String>,
        ignore_prefix: Option<String>,
    ) -> Self {
        Self {
            metadata,
            transcoder,
            sink,
            directory,
            bot_username,
            ignore_prefix: ignore_prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Handle one source chat message; never fails
    pub async fn on_message(&self, event: ChatEvent) -> RelayOutcome {
        let channel = normalize_channel(&event.channel);
        let _timer = Timer::new("relay_message", channel.clone());

        let relay_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let span = tracing::info_span!(
            "relay_message",
            channel = %channel,
            user = %event.context.username,
            relay_id = %relay_id,
        );

        self.dispatch(channel, event).instrument(span).await
    }

    async fn dispatch(&self, channel: String, event: ChatEvent) -> RelayOutcome {
        let context = &event.context;

        if self
            .bot_username
            .as_deref()
            .is_some_and(|bot| bot.eq_ignore_ascii_case(&context.username))
        {
            tracing::debug!("Ignoring own message");
            return RelayOutcome::IgnoredSelf;
        }

        if self
            .ignore_prefix
            .as_deref()
            .is_some_and(|prefix| event.text.starts_with(prefix))
        {
            tracing::debug!("Ignoring command message");
            return RelayOutcome::IgnoredCommand;
        }

        let Some(destination) = self.directory.destination_channel(&channel).await else {
            tracing::warn!("No destination channel linked, dropping message");
            return RelayOutcome::Unmapped;
        };

        let metadata = match self.metadata.ensure_loaded(&channel).await {
            Ok(metadata) => metadata,
            Err(e) => {
                let dropped = RelayError::RenderDropped(e.to_string());
                log_error("relay_message", &dropped);
                return RelayOutcome::Dropped;
            }
        };

        let color = parse_color(context.color.as_deref());
        let rendered = match context.emotes.as_deref() {
            Some(tag) => {
                let emotes = parse_emote_ranges(tag, &event.text);
                tracing::debug!(
                    badges = context.badges.len(),
                    emotes = emotes.len(),
                    text_len = event.text.len(),
                    "Rendering message"
                );
                self.transcoder
                    .render(
                        &metadata,
                        &context.username,
                        &context.badges,
                        &event.text,
                        &emotes,
                    )
                    .await
            }
            None => {
                tracing::debug!(
                    badges = context.badges.len(),
                    "No emote metadata, substituting emotes by name"
                );
                let mut rendered = self
                    .transcoder
                    .render(
                        &metadata,
                        &context.username,
                        &context.badges,
                        &event.text,
                        &InlineEmotes::new(),
                    )
                    .await;
                rendered.body_text = self
                    .transcoder
                    .substitute_by_name(&metadata, &event.text)
                    .await;
                rendered
            }
        };

        match self.sink.send_rendered(&destination, &rendered, color).await {
            Ok(()) => {
                tracing::info!(
                    destination = %destination,
                    message = %preview(&event.text),
                    "Relayed message from {}",
                    context.username
                );
                RelayOutcome::Sent
            }
            Err(e) => {
                log_error("send_rendered", &e);
                RelayOutcome::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emoji::EmojiCache;
    use crate::relay::{DEFAULT_COLOR, MessageContext};
    use crate::testing::{FakeEmojiProvider, FakeMetadataSource, RecordingSink, StaticDirectory};
    use crate::transcode::BadgeRef;

    struct Harness {
        source: Arc<FakeMetadataSource>,
        provider: Arc<FakeEmojiProvider>,
        sink: Arc<RecordingSink>,
        dispatcher: RelayDispatcher,
    }

    fn harness() -> Harness {
        let source = Arc::new(FakeMetadataSource::with_defaults());
        let provider = Arc::new(FakeEmojiProvider::new());
        let sink = Arc::new(RecordingSink::default());
        let directory = Arc::new(StaticDirectory::new(&[("somestreamer", "discord-1")]));

        let dispatcher = RelayDispatcher::new(
            Arc::new(ChannelMetadataCache::new(source.clone())),
            Transcoder::new(Arc::new(EmojiCache::new(provider.clone(), "guild"))),
            sink.clone(),
            directory,
            Some("relaybot".to_string()),
            None,
        );

        Harness {
            source,
            provider,
            sink,
            dispatcher,
        }
    }

    fn event(channel: &str, username: &str, text: &str) -> ChatEvent {
        ChatEvent {
            channel: channel.to_string(),
            context: MessageContext {
                username: username.to_string(),
                ..Default::default()
            },
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_message_relayed_with_badges_and_emotes() {
        let h = harness();
        let mut ev = event("#somestreamer", "username", "Kappa is great");
        ev.context.color = Some("#FF4500".to_string());
        ev.context.badges = vec![BadgeRef::new("broadcaster", "1")];
        ev.context.emotes = Some("25:0-4".to_string());

        let outcome = h.dispatcher.on_message(ev).await;

        assert_eq!(outcome, RelayOutcome::Sent);
        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        let (channel, message, color) = &sent[0];
        assert_eq!(channel, "discord-1");
        assert_eq!(*color, 0xFF4500);
        assert_eq!(
            message.author_label,
            format!(
                "<:twitchbroadcaster1:{}>username",
                h.provider.id_for("twitchbroadcaster1")
            )
        );
        assert_eq!(
            message.body_text,
            format!("<:twitchKappa:{}> is great", h.provider.id_for("twitchKappa"))
        );
    }

    #[tokio::test]
    async fn test_metadata_failure_drops_message() {
        let h = harness();
        h.source.set_failing(true);

        let outcome = h
            .dispatcher
            .on_message(event("#somestreamer", "viewer", "hello"))
            .await;

        assert_eq!(outcome, RelayOutcome::Dropped);
        assert!(h.sink.sent().is_empty());

        // next message retries the fetch from scratch
        h.source.set_failing(false);
        let outcome = h
            .dispatcher
            .on_message(event("#somestreamer", "viewer", "hello again"))
            .await;
        assert_eq!(outcome, RelayOutcome::Sent);
        assert_eq!(h.source.user_lookups(), 2);
    }

    #[tokio::test]
    async fn test_default_color_is_white() {
        let h = harness();

        h.dispatcher
            .on_message(event("#somestreamer", "viewer", "hi"))
            .await;

        assert_eq!(h.sink.sent()[0].2, DEFAULT_COLOR);
    }

    #[tokio::test]
    async fn test_own_messages_ignored() {
        let h = harness();

        assert_eq!(
            h.dispatcher
                .on_message(event("#somestreamer", "RelayBot", "echo"))
                .await,
            RelayOutcome::IgnoredSelf
        );
        assert!(h.sink.sent().is_empty());
        assert_eq!(h.source.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_bracketed_viewer_message_relayed_by_default() {
        let h = harness();

        let outcome = h
            .dispatcher
            .on_message(event("#somestreamer", "viewer", "[clip] lol"))
            .await;

        assert_eq!(outcome, RelayOutcome::Sent);
        assert_eq!(h.sink.sent()[0].1.body_text, "[clip] lol");
    }

    #[tokio::test]
    async fn test_configured_prefix_ignored() {
        let source = Arc::new(FakeMetadataSource::with_defaults());
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = RelayDispatcher::new(
            Arc::new(ChannelMetadataCache::new(source.clone())),
            Transcoder::new(Arc::new(EmojiCache::new(
                Arc::new(FakeEmojiProvider::new()),
                "guild",
            ))),
            sink.clone(),
            Arc::new(StaticDirectory::new(&[("somestreamer", "discord-1")])),
            None,
            Some("!".to_string()),
        );

        let outcome = dispatcher
            .on_message(event("#somestreamer", "viewer", "!uptime"))
            .await;

        assert_eq!(outcome, RelayOutcome::IgnoredCommand);
        assert!(sink.sent().is_empty());
        assert_eq!(source.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_emote_tag_substitutes_by_name() {
        let h = harness();

        h.dispatcher
            .on_message(event("#somestreamer", "viewer", "Kappa hello someHype"))
            .await;

        assert_eq!(
            h.sink.sent()[0].1.body_text,
            format!(
                "<:twitchKappa:{}> hello <:somestreamersomeHype:{}>",
                h.provider.id_for("twitchKappa"),
                h.provider.id_for("somestreamersomeHype")
            )
        );
    }

    #[tokio::test]
    async fn test_empty_emote_tag_leaves_text() {
        let h = harness();
        let mut ev = event("#somestreamer", "viewer", "Kappa typed without the emote");
        ev.context.emotes = Some(String::new());

        h.dispatcher.on_message(ev).await;

        assert_eq!(h.sink.sent()[0].1.body_text, "Kappa typed without the emote");
        assert_eq!(h.provider.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_unmapped_channel_not_fetched() {
        let h = harness();

        let outcome = h
            .dispatcher
            .on_message(event("#elsewhere", "viewer", "hi"))
            .await;

        assert_eq!(outcome, RelayOutcome::Unmapped);
        assert_eq!(h.source.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_contained() {
        let h = harness();
        h.sink.set_failing(true);

        let outcome = h
            .dispatcher
            .on_message(event("#somestreamer", "viewer", "hi"))
            .await;

        assert_eq!(outcome, RelayOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_concurrent_messages_share_channel_load() {
        let h = harness();

        let events = (0..5).map(|i| {
            let mut ev = event("#somestreamer", "viewer", "Kappa");
            ev.context.emotes = Some("25:0-4".to_string());
            ev.text = format!("Kappa {}", i);
            h.dispatcher.on_message(ev)
        });
        let outcomes = futures::future::join_all(events).await;

        assert!(outcomes.iter().all(|o| *o == RelayOutcome::Sent));
        assert_eq!(h.source.user_lookups(), 1);
        assert_eq!(h.provider.create_calls(), 1);
        assert_eq!(h.sink.sent().len(), 5);
    }
}
