//! Query-time retrieval: embed the query, search the published generation.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{Query, RankedResult};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;

/// Produces ranked passages for a query.
///
/// Ranking is entirely the index's similarity order; the retriever only
/// resolves top-K and category, checks model compatibility, and applies the
/// optional similarity floor. It never mutates the index, so an abandoned
/// query leaves nothing behind.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::new(embedder, index).with_top_k(10);
/// let results = retriever.retrieve(&Query::new("solar loan eligibility")).await?;
/// ```
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    top_k: usize,
    min_similarity: Option<f32>,
}

impl Retriever {
    /// Default number of results when neither the retriever nor the query sets one.
    pub const DEFAULT_TOP_K: usize = 3;

    /// Create a retriever over `index` using `embedder` for queries.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index, top_k: Self::DEFAULT_TOP_K, min_similarity: None }
    }

    /// Create a retriever taking top-K and the similarity floor from `config`.
    pub fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
    ) -> Self {
        Self { embedder, index, top_k: config.top_k, min_similarity: config.min_similarity }
    }

    /// Set the default number of results.
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Drop results scoring below `threshold`.
    pub fn with_min_similarity(mut self, threshold: f32) -> Self {
        self.min_similarity = Some(threshold);
        self
    }

    /// The index this retriever reads.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Retrieve the top passages for `query`.
    ///
    /// Returns fewer than K results when fewer passages qualify, and an empty
    /// list for an index that was built empty.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexUnavailable`](crate::error::RagError::IndexUnavailable) if no generation was ever built
    /// - [`RagError::ModelVersionMismatch`](crate::error::RagError::ModelVersionMismatch) / [`RagError::DimensionMismatch`](crate::error::RagError::DimensionMismatch)
    ///   if the embedder is not the one the index was built with; checked
    ///   before the query is embedded
    /// - [`RagError::EmptyInput`](crate::error::RagError::EmptyInput) for a blank query
    pub async fn retrieve(&self, query: &Query) -> Result<Vec<RankedResult>> {
        let generation = self.index.current().await?;
        generation.ensure_compatible(self.embedder.model_version(), self.embedder.dimensions())?;

        let query_vector = self.embedder.embed(&query.text).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        let k = query.top_k.unwrap_or(self.top_k);
        let category = query.category.as_deref();
        debug!(generation = generation.id(), k, category, "searching index");

        let mut results = generation.search(&query_vector, k, category)?;
        if let Some(threshold) = self.min_similarity {
            results.retain(|r| r.score >= threshold);
        }

        info!(generation = generation.id(), result_count = results.len(), "query completed");
        Ok(results)
    }

    /// Retrieve with a plain query string and the default top-K.
    pub async fn retrieve_text(&self, text: &str) -> Result<Vec<RankedResult>> {
        self.retrieve(&Query::new(text)).await
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("model_version", &self.embedder.model_version())
            .field("top_k", &self.top_k)
            .field("min_similarity", &self.min_similarity)
            .finish()
    }
}

/// Mean similarity of `results`, clamped to `[0, 1]` and rounded to two decimals.
///
/// A rough indicator of how well the corpus covers the question; `0.0` when
/// nothing was retrieved.
pub fn confidence(results: &[RankedResult]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    let mean = results.iter().map(|r| r.score).sum::<f32>() / results.len() as f32;
    (mean.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Citation, PassageId};

    fn result(score: f32) -> RankedResult {
        let passage_id = PassageId::new("doc", 0);
        RankedResult {
            passage_id: passage_id.clone(),
            score,
            text: "text".into(),
            citation: Citation {
                passage_id,
                category: String::new(),
                start_offset: 0,
                end_offset: 4,
            },
        }
    }

    #[test]
    fn confidence_is_rounded_mean() {
        assert_eq!(confidence(&[result(0.8), result(0.5)]), 0.65);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(confidence(&[result(-0.4)]), 0.0);
        assert_eq!(confidence(&[]), 0.0);
    }
}
