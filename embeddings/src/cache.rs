//! Embedding cache keyed by text and model.
//!
//! Re-embedding the same chunk or query text is the most common redundant
//! provider call (re-added documents, repeated queries). The cache sits in
//! front of the provider inside [`Embedder`](crate::Embedder).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    embedding: Embedding,
    model: String,
    /// Logical access time; the smallest value is evicted first.
    last_used: u64,
}

/// Bounded embedding cache with optional JSON persistence.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    path: Option<PathBuf>,
    max_entries: usize,
    clock: AtomicU64,
}

impl EmbeddingCache {
    /// Create an in-memory cache holding at most `max_entries` vectors.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            path: None,
            max_entries: max_entries.max(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Create a cache backed by a JSON file, loading it if it exists.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let mut cache = Self::new(max_entries);
        cache.path = Some(path.as_ref().to_path_buf());
        cache.load().await?;
        Ok(cache)
    }

    /// Hex SHA-256 of the model name and text, stable across builds so
    /// persisted keys keep matching.
    fn key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::key(text, model);
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&key)?;
        entry.last_used = self.tick();
        Some(entry.embedding.clone())
    }

    /// Insert an embedding, evicting the least recently used entry when full.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        let key = Self::key(text, model);
        let entry = CacheEntry {
            key: key.clone(),
            embedding,
            model: model.to_string(),
            last_used: self.tick(),
        };

        let mut entries = self.entries.write().await;
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            if let Some(oldest) = entries
                .values()
                .min_by_key(|e| e.last_used)
                .map(|e| e.key.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, entry);
        debug!("Cached embedding (model: {model})");
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("Cleared embedding cache");
    }

    /// Write the cache to its backing file. No-op for in-memory caches.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = {
            let entries = self.entries.read().await;
            let list: Vec<&CacheEntry> = entries.values().collect();
            serde_json::to_string(&list)?
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        debug!("Saved embedding cache to {}", path.display());
        Ok(())
    }

    async fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !fs::try_exists(path).await? {
            return Ok(());
        }

        let content = fs::read_to_string(path).await?;
        let loaded: Vec<CacheEntry> = serde_json::from_str(&content)?;

        let mut entries = self.entries.write().await;
        let mut clock = 0;
        for entry in loaded.into_iter().take(self.max_entries) {
            clock = clock.max(entry.last_used + 1);
            entries.insert(entry.key.clone(), entry);
        }
        self.clock.store(clock, Ordering::Relaxed);

        info!("Loaded {} cached embeddings from {}", entries.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = EmbeddingCache::new(100);
        cache.put("hello", "model-1", vec![1.0, 2.0, 3.0]).await;

        assert_eq!(cache.get("hello", "model-1").await, Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(cache.get("hello", "model-2").await, None);
    }

    #[test]
    fn test_key_is_a_stable_digest_of_model_and_text() {
        let key = EmbeddingCache::key("hello", "model-1");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, EmbeddingCache::key("hello", "model-1"));

        assert_ne!(key, EmbeddingCache::key("hello", "model-2"));
        assert_ne!(key, EmbeddingCache::key("hellp", "model-1"));
        // The separator keeps the model/text split unambiguous.
        assert_ne!(
            EmbeddingCache::key("b", "a"),
            EmbeddingCache::key("", "ab")
        );
        assert_eq!(
            EmbeddingCache::key("", ""),
            "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
        );
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recently_used() {
        let cache = EmbeddingCache::new(2);

        cache.put("a", "model", vec![1.0]).await;
        cache.put("b", "model", vec![2.0]).await;
        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("a", "model").await;
        cache.put("c", "model", vec![3.0]).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a", "model").await.is_some());
        assert!(cache.get("b", "model").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/embeddings.json");

        let cache = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        cache.put("persisted", "model", vec![0.5, 0.5]).await;
        cache.save().await.unwrap();

        let reloaded = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        assert_eq!(reloaded.get("persisted", "model").await, Some(vec![0.5, 0.5]));
    }
}
