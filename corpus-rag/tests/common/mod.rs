//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use corpus_rag::{
    EmbeddingProvider, EmbeddingRecord, IndexEntry, Passage, PassageId, RagError, Result,
};

/// Build an index entry for a single-passage span of `text`.
pub fn entry(
    document_id: &str,
    sequence_index: u32,
    text: &str,
    category: &str,
    vector: Vec<f32>,
    model_version: &str,
) -> IndexEntry {
    let passage = Passage {
        document_id: document_id.to_string(),
        sequence_index,
        start_offset: 0,
        end_offset: text.chars().count(),
        text: text.to_string(),
        category: category.to_string(),
    };
    IndexEntry {
        record: EmbeddingRecord {
            passage_id: PassageId::new(document_id, sequence_index),
            vector,
            model_version: model_version.to_string(),
        },
        passage,
    }
}

/// Embeds known texts to fixed vectors; anything else is an error.
pub struct TableEmbedder {
    pub model_version: String,
    pub dimensions: usize,
    pub table: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new(model_version: &str, dimensions: usize) -> Self {
        Self { model_version: model_version.to_string(), dimensions, table: HashMap::new() }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }
        self.table.get(text).cloned().ok_or_else(|| RagError::EmbeddingError {
            provider: "Table".into(),
            message: format!("no vector for '{text}'"),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}

/// A short, varied corpus of loan-product text.
pub fn loan_corpus() -> Vec<corpus_rag::Document> {
    use corpus_rag::Document;
    vec![
        Document::new(
            "https://bank.example/home-loan",
            "Home Loan",
            "Home Loan Interest Rate: 7.35% P.A. Eligibility: Salaried employees with minimum \
             3 years experience. Tenure up to 30 years. Processing fee waived for women borrowers.",
        ),
        Document::new(
            "https://bank.example/gold-loan",
            "Gold Loan",
            "Gold Loan against gold ornaments. Loan to value up to 75%. Quick disbursal with \
             minimal documentation. Interest charged monthly.",
        ),
        Document::new(
            "https://bank.example/solar-loan",
            "Agriculture Loan",
            "Solar pump loan for farmers. Eligibility: landholding farmers and kisan credit card \
             holders. Subsidy linked repayment schedule.",
        ),
    ]
}
