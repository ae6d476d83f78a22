//! Create-if-absent cache of provisioned Discord emoji

use crate::emoji::{EmojiKey, EmojiProvider, ProvisionedEmoji};
use crate::error::ProvisioningError;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Emoji cache statistics for monitoring
#[derive(Debug, Default, Clone)]
pub struct EmojiStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses satisfied by an emoji already present in the guild
    pub reused: u64,
    pub created: u64,
    pub failures: u64,
}

/// Emoji provisioning cache
///
/// Each key owns a `OnceCell`. The first caller to miss runs the lookup/create
/// sequence; concurrent callers for the same key wait on that cell instead of
/// issuing their own creation call. A failed attempt leaves the cell empty so
/// the next caller retries.
pub struct EmojiCache {
    provider: Arc<dyn EmojiProvider>,

    /// Guild that owns provisioned emoji
    guild_id: String,

    entries: DashMap<EmojiKey, Arc<OnceCell<ProvisionedEmoji>>>,

    stats: Arc<RwLock<EmojiStats>>,
}

impl EmojiCache {
    pub fn new(provider: Arc<dyn EmojiProvider>, guild_id: impl Into<String>) -> Self {
        let guild_id = guild_id.into();
        tracing::info!(guild_id = %guild_id, "Creating emoji cache");

        Self {
            provider,
            guild_id,
            entries: DashMap::new(),
            stats: Arc::new(RwLock::new(EmojiStats::default())),
        }
    }

    /// Return the emoji for `key`, provisioning it from `asset_url` on first use
    pub async fn resolve(
        &self,
        key: &EmojiKey,
        asset_url: &str,
    ) -> Result<ProvisionedEmoji, ProvisioningError> {
        // Clone the cell out so no map guard is held across an await
        let cell = self.entries.entry(key.clone()).or_default().value().clone();

        if let Some(emoji) = cell.get() {
            self.stats.write().await.hits += 1;
            tracing::trace!(key = %key, emoji = %emoji.name, "Emoji cache hit");
            return Ok(emoji.clone());
        }

        let emoji = cell
            .get_or_try_init(|| self.provision(key, asset_url))
            .await?;
        Ok(emoji.clone())
    }

    /// Find an existing guild emoji with the derived name, else create it
    async fn provision(
        &self,
        key: &EmojiKey,
        asset_url: &str,
    ) -> Result<ProvisionedEmoji, ProvisioningError> {
        self.stats.write().await.misses += 1;
        let name = key.emoji_name();

        let result = match self.provider.find_emoji(&self.guild_id, &name).await {
            Ok(Some(existing)) => {
                self.stats.write().await.reused += 1;
                tracing::debug!(key = %key, emoji = %name, "Reusing existing guild emoji");
                return Ok(existing);
            }
            Ok(None) => {
                tracing::info!(key = %key, emoji = %name, "Emoji was not cached, creating");
                self.provider
                    .create_emoji(&self.guild_id, &name, asset_url)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(emoji) => {
                self.stats.write().await.created += 1;
                tracing::info!(
                    key = %key,
                    emoji = %emoji.name,
                    emoji_id = %emoji.id,
                    "Created guild emoji"
                );
                Ok(emoji)
            }
            Err(e) => {
                self.stats.write().await.failures += 1;
                tracing::warn!(key = %key, emoji = %name, error = %e, "Emoji provisioning failed");
                Err(e)
            }
        }
    }

    /// Get a cached emoji without provisioning
    pub fn get(&self, key: &EmojiKey) -> Option<ProvisionedEmoji> {
        self.entries.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of provisioned entries
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn get_stats(&self) -> EmojiStats {
        self.stats.read().await.clone()
    }

    /// Log cache statistics (for periodic monitoring)
    pub async fn log_stats(&self) {
        let stats = self.get_stats().await;
        let lookups = stats.hits + stats.misses;
        let hit_rate = if lookups > 0 {
            (stats.hits as f32 / lookups as f32 * 100.0) as u32
        } else {
            0
        };

        tracing::info!(
            emoji_cached = self.len(),
            hit_rate = hit_rate,
            reused = stats.reused,
            created = stats.created,
            failures = stats.failures,
            "Emoji cache statistics"
        );
    }
}
