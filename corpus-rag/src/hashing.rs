//! Deterministic local embedding provider based on feature hashing.
//!
//! [`HashingEmbedder`] needs no model files or network access, which makes it
//! the default for offline indexing and for tests. Lexically similar texts
//! get similar vectors; it does not capture synonyms.

use async_trait::async_trait;
use tracing::trace;

use crate::embedding::{EmbeddingProvider, l2_normalize};
use crate::error::{RagError, Result};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Bigrams count half as much as single words.
const BIGRAM_WEIGHT: f32 = 0.5;

fn fnv1a(seed: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET ^ seed, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Lowercased alphanumeric words; falls back to individual symbols when the
/// text contains no words at all.
fn tokenize(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if !words.is_empty() {
        return words;
    }
    text.chars().filter(|c| !c.is_whitespace()).map(String::from).collect()
}

/// An [`EmbeddingProvider`] that hashes words and word bigrams into a
/// fixed number of buckets, then L2-normalises the result.
///
/// # Example
///
/// ```rust,ignore
/// use corpus_rag::HashingEmbedder;
///
/// let embedder = HashingEmbedder::new(384)?;
/// assert_eq!(embedder.model_version(), "hashing-v1/384");
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model_version: String,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimensions` components.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError("embedding dimensions must be greater than zero".into()));
        }
        Ok(Self { dimensions, model_version: format!("hashing-v1/{dimensions}") })
    }

    fn add_feature(&self, vector: &mut [f32], seed: u64, feature: &str, weight: f32) {
        let hash = fnv1a(seed, feature.as_bytes());
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }

        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimensions];
        for token in &tokens {
            self.add_feature(&mut vector, 0, token, 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut vector, 1, &bigram, BIGRAM_WEIGHT);
        }
        l2_normalize(&mut vector);

        trace!(provider = "Hashing", token_count = tokens.len(), "embedded text");
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}
