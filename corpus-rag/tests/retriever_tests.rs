//! Tests for query-time retrieval.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{TableEmbedder, entry};
use corpus_rag::{
    Chunker, Document, EmbeddingProvider, EmbeddingRecord, HashingEmbedder, IndexEntry, Query,
    RagError, Retriever, Splitter, VectorIndex,
};

const CATEGORIES: [&str; 4] = ["Home Loan", "Gold Loan", "Agriculture Loan", "MSME Loan"];

/// Split a synthetic corpus and embed every passage with `embedder`.
async fn synthetic_entries(embedder: &HashingEmbedder, passage_target: usize) -> Vec<IndexEntry> {
    let splitter = Splitter::new(120, 20).unwrap();
    let mut entries = Vec::new();
    let mut doc = 0;
    while entries.len() < passage_target {
        let category = CATEGORIES[doc % CATEGORIES.len()];
        let text = format!(
            "{category} scheme {doc}. Eligibility: applicants with income above {} lakh. \
             Solar rooftop financing available for scheme {doc}. Tenure up to {} years. \
             Interest rate {}.{}% per annum with margin {}%.",
            doc % 9 + 1,
            doc % 25 + 5,
            doc % 4 + 7,
            doc % 10,
            doc % 15 + 10,
        );
        for passage in splitter.chunk(&Document::new(format!("doc-{doc:04}"), category, text)).unwrap() {
            if entries.len() == passage_target {
                break;
            }
            let vector = embedder.embed(&passage.text).await.unwrap();
            entries.push(IndexEntry {
                record: EmbeddingRecord {
                    passage_id: passage.id(),
                    vector,
                    model_version: embedder.model_version().to_string(),
                },
                passage,
            });
        }
        doc += 1;
    }
    entries
}

#[tokio::test]
async fn solar_loan_query_over_large_index() {
    let embedder = Arc::new(HashingEmbedder::new(128).unwrap());
    let entries = synthetic_entries(&embedder, 778).await;
    let indexed: HashSet<_> = entries.iter().map(|e| e.passage.id()).collect();

    let index = Arc::new(VectorIndex::in_memory());
    index.build(embedder.model_version(), 128, entries).await.unwrap();
    assert_eq!(index.size().await, 778);

    let retriever = Retriever::new(embedder, index).with_top_k(10);
    let results = retriever.retrieve(&Query::new("solar loan eligibility")).await.unwrap();

    assert!(!results.is_empty());
    assert!(results.len() <= 10);
    for window in results.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
    assert!(results.iter().all(|r| indexed.contains(&r.passage_id)));
}

#[tokio::test]
async fn retrieve_before_build_is_unavailable() {
    let retriever = Retriever::new(Arc::new(HashingEmbedder::new(8).unwrap()), Arc::new(VectorIndex::in_memory()));
    assert!(matches!(retriever.retrieve_text("gold loan").await, Err(RagError::IndexUnavailable)));
}

#[tokio::test]
async fn model_version_mismatch_is_rejected_before_search() {
    let index = Arc::new(VectorIndex::in_memory());
    index.build("v1", 2, vec![entry("a", 0, "gold loan", "Gold Loan", vec![1.0, 0.0], "v1")]).await.unwrap();

    // The v2 embedder has no vector for the query, so reaching the embed
    // step would produce an EmbeddingError instead.
    let retriever = Retriever::new(Arc::new(TableEmbedder::new("v2", 2)), index);
    let err = retriever.retrieve_text("gold loan").await.unwrap_err();
    assert!(matches!(err, RagError::ModelVersionMismatch { ref expected, ref actual } if expected == "v1" && actual == "v2"));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() {
    let index = Arc::new(VectorIndex::in_memory());
    index.build("v1", 2, vec![entry("a", 0, "gold loan", "Gold Loan", vec![1.0, 0.0], "v1")]).await.unwrap();

    let retriever = Retriever::new(Arc::new(TableEmbedder::new("v1", 3)), index);
    assert!(matches!(
        retriever.retrieve_text("gold loan").await,
        Err(RagError::DimensionMismatch { expected: 2, actual: 3 })
    ));
}

#[tokio::test]
async fn fewer_passages_than_k_returns_what_exists() {
    let embedder = TableEmbedder::new("v1", 2).with("rates", vec![1.0, 0.0]);
    let index = Arc::new(VectorIndex::in_memory());
    index
        .build(
            "v1",
            2,
            vec![
                entry("a", 0, "home loan rates", "Home Loan", vec![1.0, 0.1], "v1"),
                entry("b", 0, "gold loan rates", "Gold Loan", vec![0.5, 0.5], "v1"),
            ],
        )
        .await
        .unwrap();

    let retriever = Retriever::new(Arc::new(embedder), index);
    let results = retriever.retrieve(&Query::new("rates").with_top_k(10)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].passage_id.document_id, "a");
}

#[tokio::test]
async fn category_and_similarity_floor_apply() {
    let embedder = TableEmbedder::new("v1", 2).with("rates", vec![1.0, 0.0]);
    let index = Arc::new(VectorIndex::in_memory());
    index
        .build(
            "v1",
            2,
            vec![
                entry("home", 0, "home loan rates", "Home Loan", vec![1.0, 0.0], "v1"),
                entry("gold", 0, "gold loan rates", "Gold Loan", vec![1.0, 1.0], "v1"),
                entry("gold", 1, "gold loan storage", "Gold Loan", vec![0.0, 1.0], "v1"),
            ],
        )
        .await
        .unwrap();

    let retriever = Retriever::new(Arc::new(embedder), index).with_min_similarity(0.5);
    let results = retriever.retrieve(&Query::new("rates").with_category("Gold Loan")).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].passage_id.to_string(), "gold#0");
}

#[tokio::test]
async fn blank_query_is_empty_input() {
    let index = Arc::new(VectorIndex::in_memory());
    index.build("v1", 2, Vec::new()).await.unwrap();
    let retriever = Retriever::new(Arc::new(TableEmbedder::new("v1", 2)), index);
    assert!(matches!(retriever.retrieve_text("  ").await, Err(RagError::EmptyInput)));
}
