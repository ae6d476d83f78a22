use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use twitch_relay::commands::CommandHandler;
use twitch_relay::config::load_settings;
use twitch_relay::discord::DiscordClient;
use twitch_relay::emoji::EmojiCache;
use twitch_relay::metadata::ChannelMetadataCache;
use twitch_relay::relay::RelayDispatcher;
use twitch_relay::storage::ChannelMap;
use twitch_relay::transcode::Transcoder;
use twitch_relay::twitch::{HelixClient, TwitchChat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("twitch_relay=debug")),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    tracing::info!("🚀 Starting Twitch relay");

    let settings = load_settings().context("failed to load configuration")?;
    tracing::info!("✅ Configuration loaded");
    tracing::debug!(
        "Config: guild={}, channel_map={:?}, prefix={:?}",
        settings.discord.emoji_guild_id,
        settings.relay.channel_map_path,
        settings.relay.command_prefix
    );

    let timeout = settings.relay.http_timeout;
    let discord = Arc::new(
        DiscordClient::new(&settings.discord, timeout).context("failed to build Discord client")?,
    );
    let helix = Arc::new(
        HelixClient::new(&settings.twitch, timeout).context("failed to build Helix client")?,
    );

    let channel_map = Arc::new(
        ChannelMap::load(settings.relay.channel_map_path.clone())
            .await
            .context("failed to load channel map")?,
    );
    let channels = channel_map.channels().await;
    if channels.is_empty() {
        tracing::warn!(
            path = %channel_map.path().display(),
            "No linked channels yet, add one with the console link command"
        );
    }

    let emoji_cache = Arc::new(EmojiCache::new(
        discord.clone(),
        settings.discord.emoji_guild_id.clone(),
    ));
    let metadata_cache = Arc::new(ChannelMetadataCache::new(helix));
    tracing::info!("Caches initialized");

    let dispatcher = Arc::new(RelayDispatcher::new(
        metadata_cache.clone(),
        Transcoder::new(emoji_cache.clone()),
        discord,
        channel_map.clone(),
        settings.twitch.bot_username.clone(),
        settings.relay.ignore_prefix.clone(),
    ));

    // Periodic cache statistics
    let stats_interval = settings.relay.stats_interval;
    let stats_metadata = metadata_cache.clone();
    let stats_emoji = emoji_cache.clone();
    let stats_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(stats_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            stats_metadata.log_stats().await;
            stats_emoji.log_stats().await;
        }
    });

    tracing::info!(channels = ?channels, "Joining Twitch chat");
    let chat = Arc::new(TwitchChat::new(settings.twitch.clone(), channels));

    // Operator commands on stdin
    let console = CommandHandler::new(
        channel_map,
        chat.clone(),
        settings.relay.command_prefix.clone(),
    );
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = console.run(stdin, tokio::io::stdout()).await {
            tracing::warn!(error = %e, "Console closed");
        }
    });

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<String>(1);
    tokio::spawn(async move {
        let signal_name = setup_shutdown_handler().await;
        let _ = shutdown_tx.send(signal_name).await;
    });

    let mut chat_task = tokio::spawn({
        let chat = chat.clone();
        async move { chat.connect(dispatcher).await }
    });

    let joined = tokio::select! {
        joined = &mut chat_task => {
            tracing::info!("Twitch chat completed");
            joined
        }
        Some(signal_name) = shutdown_rx.recv() => {
            tracing::info!(
                signal = %signal_name,
                "Received shutdown signal, initiating graceful shutdown"
            );
            chat.disconnect();
            // connect sends QUIT and drains in-flight relays before returning
            match tokio::time::timeout(Duration::from_secs(10), &mut chat_task).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!("Twitch chat did not stop in time, aborting");
                    chat_task.abort();
                    Ok(Ok(()))
                }
            }
        }
    };
    let result = joined
        .context("Twitch chat task panicked")?
        .context("Twitch chat failed");

    stats_task.abort();
    metadata_cache.log_stats().await;
    emoji_cache.log_stats().await;

    tracing::info!("Shutdown complete");
    result
}

/// Resolves with the name of the first shutdown signal received
/// Handles SIGINT (Ctrl+C), SIGTERM, and SIGQUIT on Unix systems
async fn setup_shutdown_handler() -> String {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let (Ok(mut sigint), Ok(mut sigterm), Ok(mut sigquit)) = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::quit()),
        ) else {
            tracing::error!("Failed to install signal handlers, falling back to Ctrl+C");
            let _ = signal::ctrl_c().await;
            return "Ctrl+C".to_string();
        };

        tokio::select! {
            _ = sigint.recv() => {
                tracing::debug!("Caught SIGINT signal");
                "SIGINT (Ctrl+C)".to_string()
            }
            _ = sigterm.recv() => {
                tracing::debug!("Caught SIGTERM signal");
                "SIGTERM".to_string()
            }
            _ = sigquit.recv() => {
                tracing::debug!("Caught SIGQUIT signal");
                "SIGQUIT".to_string()
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        tracing::debug!("Caught Ctrl+C signal");
        "Ctrl+C".to_string()
    }
}
