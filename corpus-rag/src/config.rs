//! Configuration for the retrieval pipeline.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for splitting, indexing, retrieval and generation.
///
/// Chunk size, overlap and top-K are corpus-dependent; the defaults are the
/// values tuned for the loan-product knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum passage size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive passages.
    pub chunk_overlap: usize,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Character budget for the assembled context.
    pub max_context_chars: usize,
    /// Results scoring below this are dropped by the retriever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f32>,
    /// Dimensionality of the embedding vectors.
    pub embedding_dimensions: usize,
    /// Number of passages sent to the embedder per batch during indexing.
    pub embedding_batch_size: usize,
    /// Maximum number of embedding batches in flight during indexing.
    pub embedding_concurrency: usize,
    /// Directory holding the persisted index generations.
    pub index_dir: PathBuf,
    /// Hard timeout for the generation service call, in seconds.
    pub generation_timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            max_context_chars: 4000,
            min_similarity: None,
            embedding_dimensions: 384,
            embedding_batch_size: 32,
            embedding_concurrency: 4,
            index_dir: PathBuf::from("./data/vector_store"),
            generation_timeout_secs: 60,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load configuration from the environment, falling back to defaults.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Recognised variables: `RAG_CHUNK_SIZE`, `RAG_CHUNK_OVERLAP`,
    /// `TOP_K_RESULTS`, `RAG_MAX_CONTEXT_CHARS`, `RAG_EMBEDDING_DIMENSIONS`,
    /// `RAG_INDEX_DIR`, `RAG_GENERATION_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a variable cannot be parsed or
    /// the resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(v) = parse_var(&lookup, "RAG_CHUNK_SIZE")? {
            builder = builder.chunk_size(v);
        }
        if let Some(v) = parse_var(&lookup, "RAG_CHUNK_OVERLAP")? {
            builder = builder.chunk_overlap(v);
        }
        if let Some(v) = parse_var(&lookup, "TOP_K_RESULTS")? {
            builder = builder.top_k(v);
        }
        if let Some(v) = parse_var(&lookup, "RAG_MAX_CONTEXT_CHARS")? {
            builder = builder.max_context_chars(v);
        }
        if let Some(v) = parse_var(&lookup, "RAG_EMBEDDING_DIMENSIONS")? {
            builder = builder.embedding_dimensions(v);
        }
        if let Some(v) = lookup("RAG_INDEX_DIR") {
            builder = builder.index_dir(v);
        }
        if let Some(v) = parse_var(&lookup, "RAG_GENERATION_TIMEOUT_SECS")? {
            builder = builder.generation_timeout_secs(v);
        }
        builder.build()
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k`, `max_context_chars`, `embedding_dimensions`,
    ///   `embedding_batch_size` or `embedding_concurrency` is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        let positive = [
            ("top_k", self.top_k),
            ("max_context_chars", self.max_context_chars),
            ("embedding_dimensions", self.embedding_dimensions),
            ("embedding_batch_size", self.embedding_batch_size),
            ("embedding_concurrency", self.embedding_concurrency),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }

    /// The generation timeout as a [`Duration`].
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RagError::ConfigError(format!("invalid value for {key} ('{raw}'): {e}"))),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum passage size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive passages in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the character budget for assembled context.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set a minimum similarity score for retrieved results.
    pub fn min_similarity(mut self, threshold: f32) -> Self {
        self.config.min_similarity = Some(threshold);
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = dims;
        self
    }

    /// Set how many passages are embedded per batch during indexing.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set how many embedding batches may run concurrently during indexing.
    pub fn embedding_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embedding_concurrency = concurrency;
        self
    }

    /// Set the directory holding persisted index generations.
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.index_dir = dir.into();
        self
    }

    /// Set the generation service timeout in seconds.
    pub fn generation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation_timeout_secs = secs;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn overlap_not_below_chunk_size_is_rejected() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(matches!(RagConfig::builder().top_k(0).build(), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = RagConfig::from_lookup(lookup_from(&[
            ("RAG_CHUNK_SIZE", "800"),
            ("RAG_CHUNK_OVERLAP", "80"),
            ("TOP_K_RESULTS", " 10 "),
            ("RAG_INDEX_DIR", "/tmp/idx"),
        ]))
        .unwrap();
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 80);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.index_dir, PathBuf::from("/tmp/idx"));
        assert_eq!(config.max_context_chars, RagConfig::default().max_context_chars);
    }

    #[test]
    fn unparsable_environment_value_is_a_config_error() {
        let err = RagConfig::from_lookup(lookup_from(&[("TOP_K_RESULTS", "many")])).unwrap_err();
        assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("TOP_K_RESULTS")));
    }
}
