//! Embedding provider abstraction.

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::EmbeddingError;

/// Maps text to a fixed-dimension vector.
///
/// Implementations must be deterministic for identical input within a run
/// and must return vectors of one dimension for every call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, returning one vector per text in order.
    ///
    /// [`embed_all`](super::embed_all) calls this once per batch. The default
    /// issues one concurrent [`embed`](Self::embed) per text; back-ends with a
    /// native batch endpoint should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        join_all(texts.iter().map(|text| self.embed(text)))
            .await
            .into_iter()
            .collect()
    }
}
