//! Embedding providers and batched, time-bounded embedding.

mod cache;
mod hashing;
mod provider;

use std::time::Duration;

use tracing::debug;

pub use cache::CachedEmbeddingProvider;
pub use hashing::HashingEmbeddingProvider;
pub use provider::EmbeddingProvider;

use crate::error::EmbeddingError;

/// Embed `texts` in order, `batch_size` texts at a time.
///
/// Each batch is one [`EmbeddingProvider::embed_batch`] call bounded by
/// `timeout`. The first failure aborts the whole call. Every returned vector
/// is checked to be non-empty, finite and of one shared dimension.
pub async fn embed_all(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    batch_size: usize,
    timeout: Duration,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut vectors = Vec::with_capacity(texts.len());
    let batch_size = batch_size.max(1);

    for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
        let request = tokio::time::timeout(timeout, provider.embed_batch(batch));
        let batch_vectors = match request.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EmbeddingError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };
        if batch_vectors.len() != batch.len() {
            return Err(EmbeddingError::Provider(anyhow::anyhow!(
                "provider {} returned {} vectors for {} texts",
                provider.name(),
                batch_vectors.len(),
                batch.len()
            )));
        }

        for vector in batch_vectors {
            let vector = check_vector(vector, vectors.first())?;
            vectors.push(vector);
        }

        debug!(
            provider = provider.name(),
            batch = batch_index,
            batch_len = batch.len(),
            "Embedded batch"
        );
    }

    Ok(vectors)
}

fn check_vector(
    vector: Vec<f32>,
    reference: Option<&Vec<f32>>,
) -> Result<Vec<f32>, EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::EmptyVector);
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::NonFinite);
    }
    if let Some(reference) = reference {
        if reference.len() != vector.len() {
            return Err(EmbeddingError::DimensionMismatch {
                left: reference.len(),
                right: vector.len(),
            });
        }
    }
    Ok(vector)
}
