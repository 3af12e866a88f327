//! Data types for documents, passages, embedding records and search results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A cleaned source document, as supplied by the acquisition stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Source locator, unique within the corpus.
    pub id: String,
    /// Title or category tag. May be empty when the category is inferred per passage.
    #[serde(default)]
    pub category: String,
    /// The cleaned full text.
    pub text: String,
}

impl Document {
    /// Create a new document.
    pub fn new(id: impl Into<String>, category: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), category: category.into(), text: text.into() }
    }

    /// Reject documents that cannot be split.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(RagError::MalformedRecord("document id must not be empty".into()));
        }
        if self.text.trim().is_empty() {
            return Err(RagError::MalformedRecord(format!("document '{}' has no text", self.id)));
        }
        Ok(())
    }
}

/// Stable identity of a passage: its parent document and position within it.
///
/// Ordering is by document id, then sequence index; ties in similarity are
/// broken by this order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PassageId {
    /// The parent document's id.
    pub document_id: String,
    /// Zero-based position of the passage within its document.
    pub sequence_index: u32,
}

impl PassageId {
    /// Create a new passage id.
    pub fn new(document_id: impl Into<String>, sequence_index: u32) -> Self {
        Self { document_id: document_id.into(), sequence_index }
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.sequence_index)
    }
}

/// A bounded span of a source document; the atomic unit of retrieval.
///
/// Offsets count characters, not bytes, and are half-open (`start..end`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passage {
    /// The parent document's id.
    pub document_id: String,
    /// Zero-based position within the parent document.
    pub sequence_index: u32,
    /// Character offset of the first character.
    pub start_offset: usize,
    /// Character offset one past the last character.
    pub end_offset: usize,
    /// The passage text.
    pub text: String,
    /// Category inherited from the document or inferred from the text.
    pub category: String,
}

impl Passage {
    /// This passage's stable id.
    pub fn id(&self) -> PassageId {
        PassageId::new(self.document_id.clone(), self.sequence_index)
    }

    /// Length of the passage in characters.
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.document_id.is_empty() {
            return Err(RagError::MalformedRecord("passage has an empty document id".into()));
        }
        if self.text.is_empty() {
            return Err(RagError::MalformedRecord(format!("passage {} has no text", self.id())));
        }
        if self.end_offset <= self.start_offset
            || self.text.chars().count() != self.end_offset - self.start_offset
        {
            return Err(RagError::MalformedRecord(format!(
                "passage {} offsets {}..{} do not match its text",
                self.id(),
                self.start_offset,
                self.end_offset
            )));
        }
        Ok(())
    }
}

/// The embedding of one passage under one model version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    /// The embedded passage.
    pub passage_id: PassageId,
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// The model version that produced the vector.
    pub model_version: String,
}

/// One indexed item: a passage and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The passage payload.
    pub passage: Passage,
    /// The passage's embedding.
    pub record: EmbeddingRecord,
}

/// A retrieval request. Ephemeral; carries no identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// The question text.
    pub text: String,
    /// Restrict results to passages of this category.
    pub category: Option<String>,
    /// Override the configured top-K.
    pub top_k: Option<usize>,
}

impl Query {
    /// Create a query with no filter or top-K override.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    /// Restrict results to a single category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Override the number of results.
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }
}

/// Where a retrieved passage came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    /// The cited passage.
    pub passage_id: PassageId,
    /// The passage's category.
    pub category: String,
    /// Character offset of the passage within its document.
    pub start_offset: usize,
    /// Character offset one past the end of the passage.
    pub end_offset: usize,
}

impl Citation {
    pub(crate) fn from_passage(passage: &Passage) -> Self {
        Self {
            passage_id: passage.id(),
            category: passage.category.clone(),
            start_offset: passage.start_offset,
            end_offset: passage.end_offset,
        }
    }
}

/// A passage returned by search, with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedResult {
    /// The matched passage.
    pub passage_id: PassageId,
    /// Cosine similarity (higher is more relevant).
    pub score: f32,
    /// The passage text.
    pub text: String,
    /// Citation metadata for the passage.
    pub citation: Citation,
}
