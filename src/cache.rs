use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::namer::NameKind;

/// Summarizer results keyed by a stable digest of the captured context.
/// Any context change, including enrichment lines, busts the key.
pub struct NameCache {
    dir: PathBuf,
    enabled: bool,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    name: String,
}

impl NameCache {
    pub fn new(dir: PathBuf, enabled: bool) -> Self {
        Self { dir, enabled }
    }

    pub fn key(kind: NameKind, context: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(match kind {
            NameKind::Window => b"window".as_slice(),
            NameKind::Session => b"session".as_slice(),
        });
        hasher.update([0u8]);
        hasher.update(context.as_bytes());
        let digest = hasher.finalize();
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let data = tokio::fs::read(self.entry_path(key)).await.ok()?;
        // an unreadable entry is just a miss
        let entry: CacheEntry = serde_json::from_slice(&data).ok()?;
        Some(entry.name)
    }

    pub async fn put(&self, key: &str, name: &str) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.write(key, name).await {
            debug!("cache write skipped: {e:#}");
        }
    }

    async fn write(&self, key: &str, name: &str) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let data = serde_json::to_vec(&CacheEntry {
            name: name.to_string(),
        })?;
        tokio::fs::write(self.entry_path(key), data).await?;
        Ok(())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}
