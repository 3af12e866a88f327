//! Error types for the `corpus-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error, e.g. `chunk_overlap >= chunk_size`.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The embedding model does not match the model the index was built with.
    #[error("Model version mismatch: index built with '{expected}', embedder reports '{actual}'")]
    ModelVersionMismatch {
        /// The model version recorded in the index.
        expected: String,
        /// The model version reported by the embedder.
        actual: String,
    },

    /// Embedding was requested for empty or whitespace-only text.
    #[error("Cannot embed empty input")]
    EmptyInput,

    /// A vector does not have the dimensionality the index expects.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality of the index (or embedder).
        expected: usize,
        /// The dimensionality of the offending vector.
        actual: usize,
    },

    /// A vector contains NaN or infinite components.
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// A document, passage or record failed validation at ingestion.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A rebuild produced no passages at all because every item failed.
    ///
    /// The previously published generation is kept.
    #[error("Rebuild produced no passages: {failures} item(s) failed")]
    EmptyRebuild {
        /// Number of documents and passages that failed.
        failures: usize,
    },

    /// No index generation has ever been built or loaded.
    #[error("Index unavailable: no generation has been built")]
    IndexUnavailable,

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The on-disk index is missing pieces or inconsistent.
    #[error("Index storage error at {}: {message}", path.display())]
    Storage {
        /// The file or directory involved.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error from the generation service.
    #[error("Generation error: {message}")]
    GenerationError {
        /// A description of the failure.
        message: String,
    },

    /// An I/O error while reading or writing the index.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error encoding or decoding persisted index data.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Whether this error belongs to the fatal configuration class.
    ///
    /// Configuration errors are surfaced immediately and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::ModelVersionMismatch { .. })
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage { path: path.into(), message: message.into() }
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
