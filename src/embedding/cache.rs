//! Memoizing wrapper around an embedding provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::provider::EmbeddingProvider;
use crate::error::EmbeddingError;

/// Caches vectors keyed by whitespace-collapsed text.
///
/// Errors are never cached.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: RwLock<HashMap<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get cache statistics as `(hits, misses)`.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Number of cached vectors.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Drop every cached vector.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }
}

fn cache_key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = cache_key(text);

        if let Some(vector) = self.cache.read().await.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(provider = self.inner.name(), "Embedding cache hit");
            return Ok(vector.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = self.inner.embed(text).await?;
        self.cache.write().await.insert(key, vector.clone());
        Ok(vector)
    }

    /// Serve hits from the cache and send all misses as one inner batch.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let keys: Vec<String> = texts.iter().map(|text| cache_key(text)).collect();
        let mut vectors: Vec<Option<Vec<f32>>> = {
            let cache = self.cache.read().await;
            keys.iter().map(|key| cache.get(key).cloned()).collect()
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();
        let hits = (texts.len() - missing.len()) as u64;
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(missing.len() as u64, Ordering::Relaxed);
        trace!(provider = self.inner.name(), hits, misses = missing.len(), "Embedding cache batch");

        if !missing.is_empty() {
            let batch: Vec<&str> = missing.iter().map(|&i| texts[i]).collect();
            let fetched = self.inner.embed_batch(&batch).await?;
            if fetched.len() != batch.len() {
                return Err(EmbeddingError::Provider(anyhow::anyhow!(
                    "provider {} returned {} vectors for {} texts",
                    self.inner.name(),
                    fetched.len(),
                    batch.len()
                )));
            }

            let mut cache = self.cache.write().await;
            for (i, vector) in missing.into_iter().zip(fetched) {
                cache.insert(keys[i].clone(), vector.clone());
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors.into_iter().flatten().collect())
    }
}
