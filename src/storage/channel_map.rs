use crate::error::Result;
use crate::relay::{ChannelDirectory, normalize_channel};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// Twitch channel -> Discord channel links, persisted as a JSON object
pub struct ChannelMap {
    path: PathBuf,
    links: RwLock<BTreeMap<String, String>>,
}

impl ChannelMap {
    /// Load the map from disk; a missing file is an empty map
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let links = match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => {
                let raw: BTreeMap<String, String> = serde_json::from_str(&content)?;
                raw.into_iter()
                    .map(|(source, dest)| (normalize_channel(&source), dest))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No channel map yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(path = %path.display(), links = links.len(), "Loaded channel map");
        Ok(Self {
            path,
            links: RwLock::new(links),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get_destination_channel(&self, source_channel: &str) -> Option<String> {
        self.links
            .read()
            .await
            .get(&normalize_channel(source_channel))
            .cloned()
    }

    /// Link a source channel to a destination and write the map to disk
    pub async fn link(&self, source_channel: &str, destination_channel: &str) -> Result<()> {
        let mut links = self.links.write().await;
        let source = normalize_channel(source_channel);
        let previous = links.insert(source.clone(), destination_channel.to_string());

        // Persist while still holding the write lock
        self.persist(&links).await?;

        tracing::info!(
            source = %source,
            destination = %destination_channel,
            replaced = ?previous,
            "Linked channel"
        );
        Ok(())
    }

    /// Source channels currently linked, sorted
    pub async fn channels(&self) -> Vec<String> {
        self.links.read().await.keys().cloned().collect()
    }

    async fn persist(&self, links: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(links)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl ChannelDirectory for ChannelMap {
    async fn destination_channel(&self, source_channel: &str) -> Option<String> {
        self.get_destination_channel(source_channel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let map = assert_ok!(ChannelMap::load(dir.path().join("channels.json")).await);

        assert!(map.channels().await.is_empty());
        assert_eq!(map.get_destination_channel("shroud").await, None);
    }

    #[tokio::test]
    async fn test_link_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("channels.json");

        let map = ChannelMap::load(&path).await.unwrap();
        assert_ok!(map.link("#Shroud", "123456789").await);
        assert_ok!(map.link("pokimane", "987654321").await);

        let reloaded = ChannelMap::load(&path).await.unwrap();
        assert_eq!(reloaded.channels().await, vec!["pokimane", "shroud"]);
        assert_eq!(
            reloaded.get_destination_channel("shroud").await.as_deref(),
            Some("123456789")
        );
    }

    #[tokio::test]
    async fn test_relink_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let map = ChannelMap::load(dir.path().join("channels.json"))
            .await
            .unwrap();

        map.link("shroud", "1").await.unwrap();
        map.link("SHROUD", "2").await.unwrap();

        assert_eq!(map.channels().await.len(), 1);
        assert_eq!(map.destination_channel("#shroud").await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_keys_normalized_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, r##"{"#Shroud": "42"}"##).unwrap();

        let map = ChannelMap::load(&path).await.unwrap();
        assert_eq!(map.channels().await, vec!["shroud"]);
    }

    #[tokio::test]
    async fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(ChannelMap::load(&path).await.is_err());
    }
}
