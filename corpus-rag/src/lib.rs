//! Retrieval pipeline for question answering over a fixed document corpus.
//!
//! This crate provides:
//! - Boundary-preferring document splitting with exact overlap ([`Splitter`])
//! - Embedding providers behind one trait ([`EmbeddingProvider`], [`HashingEmbedder`])
//! - A persistent cosine-similarity index with atomic generation swaps ([`VectorIndex`])
//! - Query-time retrieval and bounded context assembly ([`Retriever`], [`ContextAssembler`])
//! - Batch rebuilds and question answering over an external generator
//!   ([`Indexer`], [`QaPipeline`])
//!
//! The generation service itself is an external collaborator, reached
//! through the [`Generator`] trait.

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod hashing;
pub mod index;
pub mod pipeline;
pub mod retriever;
pub mod storage;
pub mod telemetry;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{CategoryRule, Chunker, KeywordCategorizer, Splitter};
pub use config::{RagConfig, RagConfigBuilder};
pub use context::{AssembledContext, ContextAssembler, ContextCitation};
pub use document::{
    Citation, Document, EmbeddingRecord, IndexEntry, Passage, PassageId, Query, RankedResult,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{GenerationOptions, GenerationRequest, Generator, PromptTemplate};
pub use hashing::HashingEmbedder;
pub use index::{IndexDescriptor, IndexGeneration, VectorIndex};
pub use pipeline::{
    Answer, AnswerStatus, FailedItem, IndexReport, Indexer, ItemFailure, QaPipeline,
    QaPipelineBuilder,
};
pub use retriever::{Retriever, confidence};
pub use storage::IndexStorage;

#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
