//! Batch indexing and question answering.
//!
//! [`Indexer`] rebuilds the index wholesale: split → embed → build.
//! [`QaPipeline`] answers a question: retrieve → assemble → generate.
//!
//! # Example
//!
//! ```rust,ignore
//! use corpus_rag::{Indexer, QaPipeline, RagConfig, Splitter, HashingEmbedder, VectorIndex};
//!
//! let config = RagConfig::from_env()?;
//! let index = Arc::new(VectorIndex::open(&config.index_dir).await?);
//! let embedder = Arc::new(HashingEmbedder::new(config.embedding_dimensions)?);
//!
//! let indexer = Indexer::new(config.clone(), Arc::new(Splitter::from_config(&config)?),
//!     embedder.clone(), index.clone())?;
//! let report = indexer.rebuild(&documents).await?;
//!
//! let qa = QaPipeline::builder()
//!     .config(config)
//!     .embedding_provider(embedder)
//!     .index(index)
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//! let answer = qa.answer(&Query::new("What are the home loan interest rates?")).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::context::{AssembledContext, ContextAssembler};
use crate::document::{Document, EmbeddingRecord, IndexEntry, Passage, PassageId, Query, RankedResult};
use crate::embedding::{EmbeddingProvider, check_vector};
use crate::error::{RagError, Result};
use crate::generation::{GenerationOptions, GenerationRequest, Generator};
use crate::index::{IndexDescriptor, VectorIndex};
use crate::retriever::{Retriever, confidence};

/// The document or passage a per-item failure refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedItem {
    /// A document that could not be split.
    Document(String),
    /// A passage that could not be embedded.
    Passage(PassageId),
}

/// One item that was left out of a rebuild, and why.
#[derive(Debug)]
pub struct ItemFailure {
    /// The failed item.
    pub item: FailedItem,
    /// The error it failed with.
    pub error: RagError,
}

/// Outcome of [`Indexer::rebuild`].
#[derive(Debug)]
pub struct IndexReport {
    /// The published generation.
    pub descriptor: IndexDescriptor,
    /// Documents submitted.
    pub documents_total: usize,
    /// Documents with at least one indexed passage.
    pub documents_indexed: usize,
    /// Passages in the new generation.
    pub passages_indexed: usize,
    /// Items that were skipped.
    pub failures: Vec<ItemFailure>,
}

/// Rebuilds a [`VectorIndex`] from a document corpus.
///
/// Malformed documents, repeats of an already seen document id, and
/// passages whose embedding fails are reported in the [`IndexReport`] and
/// skipped; the rest of the corpus is still indexed. The first document
/// with a given id wins.
pub struct Indexer {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
}

impl Indexer {
    /// Create an indexer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is invalid or
    /// the embedder's dimensionality differs from `config.embedding_dimensions`.
    pub fn new(
        config: RagConfig,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimensions() != config.embedding_dimensions {
            return Err(RagError::ConfigError(format!(
                "embedder produces {} dimensions but embedding_dimensions is {}",
                embedder.dimensions(),
                config.embedding_dimensions
            )));
        }
        Ok(Self { config, chunker, embedder, index })
    }

    /// Split, embed and index `documents`, replacing the published generation.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyRebuild`] if items failed and nothing was left
    /// to index, or any error from [`VectorIndex::build`]. In both cases the
    /// previous generation stays published.
    pub async fn rebuild(&self, documents: &[Document]) -> Result<IndexReport> {
        let mut failures = Vec::new();

        let mut passages: Vec<Passage> = Vec::new();
        let mut seen_ids: HashSet<&str> = HashSet::new();
        for document in documents {
            if !seen_ids.insert(document.id.as_str()) {
                warn!(document.id = %document.id, "skipping document with duplicate id");
                failures.push(ItemFailure {
                    item: FailedItem::Document(document.id.clone()),
                    error: RagError::MalformedRecord(format!("duplicate document id {}", document.id)),
                });
                continue;
            }
            match self.chunker.chunk(document) {
                Ok(split) => passages.extend(split),
                Err(error) => {
                    warn!(document.id = %document.id, error = %error, "skipping document");
                    failures.push(ItemFailure { item: FailedItem::Document(document.id.clone()), error });
                }
            }
        }

        let vectors = self.embed_passages(&passages).await;
        let model_version = self.embedder.model_version().to_string();
        let dimensions = self.config.embedding_dimensions;

        let mut entries = Vec::with_capacity(passages.len());
        for (passage, vector) in passages.into_iter().zip(vectors) {
            let vector = vector.and_then(|v| check_vector(&v, dimensions).map(|()| v));
            match vector {
                Ok(vector) => entries.push(IndexEntry {
                    record: EmbeddingRecord {
                        passage_id: passage.id(),
                        vector,
                        model_version: model_version.clone(),
                    },
                    passage,
                }),
                Err(error) => {
                    warn!(passage = %passage.id(), error = %error, "skipping passage");
                    failures.push(ItemFailure { item: FailedItem::Passage(passage.id()), error });
                }
            }
        }

        if entries.is_empty() && !failures.is_empty() {
            return Err(RagError::EmptyRebuild { failures: failures.len() });
        }

        let mut indexed_documents: Vec<&str> =
            entries.iter().map(|e| e.passage.document_id.as_str()).collect();
        indexed_documents.dedup();
        let documents_indexed = indexed_documents.len();
        let passages_indexed = entries.len();

        let descriptor = self.index.build(&model_version, dimensions, entries).await?;

        info!(
            generation = %descriptor.generation_id,
            documents_total = documents.len(),
            documents_indexed,
            passages_indexed,
            failure_count = failures.len(),
            "index rebuild complete"
        );

        Ok(IndexReport {
            descriptor,
            documents_total: documents.len(),
            documents_indexed,
            passages_indexed,
            failures,
        })
    }

    /// Embed passages in batches, several batches at a time.
    ///
    /// The output has one entry per passage, in passage order.
    async fn embed_passages(&self, passages: &[Passage]) -> Vec<Result<Vec<f32>>> {
        let embedder = &self.embedder;
        let batches: Vec<Vec<Result<Vec<f32>>>> =
            futures::stream::iter(passages.chunks(self.config.embedding_batch_size))
                .map(|batch| async move {
                    let texts: Vec<&str> = batch.iter().map(|p| p.text.as_str()).collect();
                    debug!(batch_size = texts.len(), "embedding passage batch");
                    let mut results = embedder.embed_batch(&texts).await;
                    // A provider returning too few results fails the missing items.
                    while results.len() < texts.len() {
                        results.push(Err(RagError::EmbeddingError {
                            provider: embedder.model_version().to_string(),
                            message: "provider returned fewer embeddings than inputs".into(),
                        }));
                    }
                    results.truncate(texts.len());
                    results
                })
                .buffered(self.config.embedding_concurrency)
                .collect()
                .await;

        batches.into_iter().flatten().collect()
    }
}

/// Outcome of the generation step.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerStatus {
    /// The generation service answered.
    Generated(String),
    /// Nothing relevant was retrieved; the generation service was not called.
    NoContext,
    /// The generation service did not answer within the timeout.
    TimedOut,
    /// The generation service failed.
    Failed(String),
}

/// An answer with the retrieved material it was based on.
///
/// Context and citations are present whatever the [`AnswerStatus`], so a
/// caller can show the sources when generation fails.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The question asked.
    pub question: String,
    /// What the generation step produced.
    pub status: AnswerStatus,
    /// The assembled context and its citations.
    pub context: AssembledContext,
    /// The ranked passages retrieved for the question.
    pub results: Vec<RankedResult>,
    /// See [`confidence`](crate::retriever::confidence).
    pub confidence: f32,
}

impl Answer {
    /// The generated text, if generation succeeded.
    pub fn text(&self) -> Option<&str> {
        match &self.status {
            AnswerStatus::Generated(text) => Some(text),
            _ => None,
        }
    }
}

/// Question answering over a published index.
///
/// Construct one via [`QaPipeline::builder()`].
pub struct QaPipeline {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: Arc<dyn Generator>,
    options: GenerationOptions,
    max_context_chars: usize,
    generation_timeout: Duration,
}

impl QaPipeline {
    /// Create a new [`QaPipelineBuilder`].
    pub fn builder() -> QaPipelineBuilder {
        QaPipelineBuilder::default()
    }

    /// The retriever used for queries.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieve and assemble context without calling the generation service.
    ///
    /// # Errors
    ///
    /// Any error from [`Retriever::retrieve`].
    pub async fn retrieve_context(
        &self,
        query: &Query,
    ) -> Result<(Vec<RankedResult>, AssembledContext)> {
        let results = self.retriever.retrieve(query).await?;
        let context = self.assembler.assemble(&results, self.max_context_chars);
        Ok((results, context))
    }

    /// Answer `query`.
    ///
    /// Retrieval errors are returned as `Err`. Generation failures and
    /// timeouts are reported in [`Answer::status`] with the context intact.
    pub async fn answer(&self, query: &Query) -> Result<Answer> {
        let (results, context) = self.retrieve_context(query).await?;
        let confidence = confidence(&results);

        let status = if context.is_empty() {
            AnswerStatus::NoContext
        } else {
            let request = GenerationRequest {
                question: query.text.clone(),
                context: context.text.clone(),
                citations: context.citations.clone(),
                options: self.options.clone(),
            };
            match tokio::time::timeout(self.generation_timeout, self.generator.generate(&request))
                .await
            {
                Ok(Ok(text)) => AnswerStatus::Generated(text),
                Ok(Err(e)) => {
                    warn!(error = %e, "generation failed");
                    AnswerStatus::Failed(e.to_string())
                }
                Err(_) => {
                    warn!(timeout_secs = self.generation_timeout.as_secs_f64(), "generation timed out");
                    AnswerStatus::TimedOut
                }
            }
        };

        info!(
            citation_count = context.citations.len(),
            confidence,
            generated = matches!(status, AnswerStatus::Generated(_)),
            "answered question"
        );

        Ok(Answer { question: query.text.clone(), status, context, results, confidence })
    }
}

/// Builder for constructing a [`QaPipeline`].
///
/// `config`, `embedding_provider`, `index` and `generator` are required.
#[derive(Default)]
pub struct QaPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<VectorIndex>>,
    generator: Option<Arc<dyn Generator>>,
    assembler: Option<ContextAssembler>,
    options: Option<GenerationOptions>,
}

impl QaPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for queries.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the index to query.
    pub fn index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the generation service.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the default context assembler.
    pub fn assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = Some(assembler);
        self
    }

    /// Override the default generation options.
    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Build the [`QaPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<QaPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let index =
            self.index.ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        Ok(QaPipeline {
            retriever: Retriever::from_config(&config, embedding_provider, index),
            assembler: self.assembler.unwrap_or_default(),
            generator,
            options: self.options.unwrap_or_default(),
            max_context_chars: config.max_context_chars,
            generation_timeout: config.generation_timeout(),
        })
    }
}
