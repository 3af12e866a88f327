//! Embedding provider trait and vector helpers.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations must be deterministic for a given
/// [`model_version`](EmbeddingProvider::model_version): the same text always
/// maps to the same vector, and [`embed_batch`](EmbeddingProvider::embed_batch)
/// returns exactly what calling [`embed`](EmbeddingProvider::embed) on each
/// input in turn would return, in input order.
///
/// # Example
///
/// ```rust,ignore
/// use corpus_rag::{EmbeddingProvider, HashingEmbedder};
///
/// let provider = HashingEmbedder::new(384)?;
/// let embedding = provider.embed("home loan eligibility").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyInput`] for empty or whitespace-only text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Each input gets its own result so that one bad item does not discard
    /// the others. The default implementation calls
    /// [`embed`](EmbeddingProvider::embed) sequentially; backends with native
    /// batching should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Vec<Result<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await);
        }
        results
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Identify the model (and its configuration) that produces the vectors.
    ///
    /// Vectors from different model versions are not comparable.
    fn model_version(&self) -> &str;
}

/// Check that a vector has the expected length and only finite components.
pub fn check_vector(vector: &[f32], expected_dimensions: usize) -> Result<()> {
    if vector.len() != expected_dimensions {
        return Err(RagError::DimensionMismatch {
            expected: expected_dimensions,
            actual: vector.len(),
        });
    }
    if let Some(pos) = vector.iter().position(|x| !x.is_finite()) {
        return Err(RagError::InvalidVector(format!("component {pos} is not finite")));
    }
    Ok(())
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Dot product of two equal-length vectors.
///
/// For unit vectors this is their cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((dot(&v, &v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn check_vector_rejects_wrong_length_and_nan() {
        assert!(matches!(
            check_vector(&[1.0, 2.0], 3),
            Err(RagError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(matches!(check_vector(&[1.0, f32::NAN], 2), Err(RagError::InvalidVector(_))));
        assert!(check_vector(&[1.0, 0.5], 2).is_ok());
    }
}
