//! Vector similarity and distribution helpers.

use crate::error::EmbeddingError;

/// Cosine similarity in `[-1, 1]`.
///
/// A zero-norm vector has similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.is_empty() || b.is_empty() {
        return Err(EmbeddingError::EmptyVector);
    }
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.iter().chain(b).any(|v| !v.is_finite()) {
        return Err(EmbeddingError::NonFinite);
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
    } else {
        Ok(0.0)
    }
}

/// Cosine distance, `1 - cosine_similarity`, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    cosine_similarity(a, b).map(|similarity| 1.0 - similarity)
}

/// Nearest-rank percentile: sort ascending, take index `ceil(p/100 * n) - 1`.
///
/// Returns `None` for an empty slice. The index is clamped into range.
pub fn percentile(values: &[f32], p: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);

    let rank = (p / 100.0 * sorted.len() as f32).ceil() as isize - 1;
    let index = rank.clamp(0, sorted.len() as isize - 1) as usize;
    Some(sorted[index])
}
