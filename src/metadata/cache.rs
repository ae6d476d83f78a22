//! Lazy per-channel metadata cache

use crate::error::{RelayError, Result};
use crate::metadata::{ChannelMetadata, MetadataSource};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub channel_hits: u64,
    pub channel_misses: u64,
    /// Fetch sequences issued (five Helix requests each)
    pub api_calls: u64,
    pub api_errors: u64,
}

/// Channel metadata cache with lazy-loading from the Helix API
///
/// Entries are never refreshed: badges and emotes loaded for a channel stay
/// valid until the process restarts.
pub struct ChannelMetadataCache {
    source: Arc<dyn MetadataSource>,

    /// Channel login -> loaded metadata (lazy-populated)
    channels: DashMap<String, Arc<OnceCell<Arc<ChannelMetadata>>>>,

    stats: Arc<RwLock<CacheStats>>,
}

impl ChannelMetadataCache {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        tracing::info!("Creating channel metadata cache with lazy-loading");

        Self {
            source,
            channels: DashMap::new(),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    /// Return metadata for `channel`, fetching it on first use
    ///
    /// On failure nothing is cached; the next call fetches from scratch.
    pub async fn ensure_loaded(&self, channel: &str) -> Result<Arc<ChannelMetadata>> {
        let cell = self
            .channels
            .entry(channel.to_string())
            .or_default()
            .value()
            .clone();

        if let Some(metadata) = cell.get() {
            self.stats.write().await.channel_hits += 1;
            tracing::trace!(channel = %channel, "Channel metadata cache hit");
            return Ok(metadata.clone());
        }

        let metadata = cell
            .get_or_try_init(|| async {
                self.stats.write().await.channel_misses += 1;
                tracing::debug!(channel = %channel, "Channel metadata cache miss, fetching from Helix");

                match self.fetch(channel).await {
                    Ok(metadata) => {
                        let (badges, emotes) = metadata.sizes();
                        tracing::info!(
                            channel = %channel,
                            broadcaster_id = %metadata.broadcaster_id,
                            badge_sets = badges,
                            emotes = emotes,
                            "Fetched and cached channel metadata"
                        );
                        Ok(Arc::new(metadata))
                    }
                    Err(e) => {
                        self.stats.write().await.api_errors += 1;
                        Err(RelayError::MetadataFetch(format!("{}: {}", channel, e)))
                    }
                }
            })
            .await?;

        Ok(metadata.clone())
    }

    /// Fetch user id, channel badges, global badges, channel emotes, global emotes
    async fn fetch(&self, channel: &str) -> Result<ChannelMetadata> {
        self.stats.write().await.api_calls += 1;

        let user_id = self.source.get_user_id(channel).await?;
        let channel_badges = self.source.get_channel_badges(&user_id).await?;
        let global_badges = self.source.get_global_badges().await?;
        let channel_emotes = self.source.get_channel_emotes(&user_id).await?;
        let global_emotes = self.source.get_global_emotes().await?;

        Ok(ChannelMetadata::new(
            channel,
            user_id,
            &channel_badges,
            &global_badges,
            &channel_emotes,
            &global_emotes,
        ))
    }

    /// Get already-loaded metadata without fetching
    pub fn get(&self, channel: &str) -> Option<Arc<ChannelMetadata>> {
        self.channels
            .get(channel)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of loaded channels
    pub fn cache_size(&self) -> usize {
        self.channels
            .iter()
            .filter(|e| e.value().initialized())
            .count()
    }

    pub async fn get_stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Log cache statistics (for periodic monitoring)
    pub async fn log_stats(&self) {
        let stats = self.get_stats().await;

        let hit_rate = if stats.channel_hits + stats.channel_misses > 0 {
            (stats.channel_hits as f32 / (stats.channel_hits + stats.channel_misses) as f32
                * 100.0) as u32
        } else {
            0
        };

        tracing::info!(
            channels_cached = self.cache_size(),
            channel_hit_rate = hit_rate,
            api_calls = stats.api_calls,
            api_errors = stats.api_errors,
            "Channel metadata cache statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMetadataSource;
    use std::time::Duration;

    #[tokio::test]
    async fn test_second_load_does_not_refetch() {
        let source = Arc::new(FakeMetadataSource::with_defaults());
        let cache = ChannelMetadataCache::new(source.clone());

        let first = cache.ensure_loaded("somestreamer").await.unwrap();
        let second = cache.ensure_loaded("somestreamer").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.user_lookups(), 1);
        assert_eq!(source.total_calls(), 5);
        assert_eq!(cache.get_stats().await.channel_hits, 1);
    }

    #[tokio::test]
    async fn test_fetch_order() {
        let source = Arc::new(FakeMetadataSource::with_defaults());
        let cache = ChannelMetadataCache::new(source.clone());

        cache.ensure_loaded("somestreamer").await.unwrap();

        assert_eq!(
            source.call_log(),
            vec![
                "users:somestreamer",
                "channel_badges:1001",
                "global_badges",
                "channel_emotes:1001",
                "global_emotes",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_leaves_channel_unpopulated() {
        let source = Arc::new(FakeMetadataSource::with_defaults());
        source.set_failing(true);
        let cache = ChannelMetadataCache::new(source.clone());

        let err = cache.ensure_loaded("somestreamer").await.unwrap_err();
        assert!(matches!(err, RelayError::MetadataFetch(_)));
        assert!(cache.get("somestreamer").is_none());
        assert_eq!(cache.cache_size(), 0);

        source.set_failing(false);
        tokio_test::assert_ok!(cache.ensure_loaded("somestreamer").await);
        assert_eq!(source.user_lookups(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_messages_share_fetch() {
        let source = Arc::new(
            FakeMetadataSource::with_defaults().with_latency(Duration::from_millis(20)),
        );
        let cache = ChannelMetadataCache::new(source.clone());

        let loads = (0..10).map(|_| cache.ensure_loaded("somestreamer"));
        let results = futures::future::join_all(loads).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(source.user_lookups(), 1);
    }

    #[tokio::test]
    async fn test_channels_cached_independently() {
        let source = Arc::new(FakeMetadataSource::with_defaults());
        let cache = ChannelMetadataCache::new(source.clone());

        cache.ensure_loaded("alpha").await.unwrap();
        cache.ensure_loaded("beta").await.unwrap();

        assert_eq!(cache.cache_size(), 2);
        assert_eq!(source.user_lookups(), 2);
    }
}
