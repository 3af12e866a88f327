//! Tests for embedding providers.

mod common;

use common::TableEmbedder;
use corpus_rag::{EmbeddingProvider, HashingEmbedder, RagError};
use proptest::prelude::*;

/// **Batching equivalence**: `embed_batch` returns what element-wise `embed`
/// returns, in input order.
mod prop_batch_equivalence {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn batch_matches_single_calls(texts in proptest::collection::vec("[a-zA-Z0-9 .,]{0,60}", 0..12)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let embedder = HashingEmbedder::new(32).unwrap();
            let (batched, singles) = rt.block_on(async {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                let batched = embedder.embed_batch(&refs).await;
                let mut singles = Vec::new();
                for text in &texts {
                    singles.push(embedder.embed(text).await);
                }
                (batched, singles)
            });

            prop_assert_eq!(batched.len(), singles.len());
            for (b, s) in batched.iter().zip(&singles) {
                match (b, s) {
                    (Ok(b), Ok(s)) => prop_assert_eq!(b, s),
                    (Err(RagError::EmptyInput), Err(RagError::EmptyInput)) => {}
                    other => prop_assert!(false, "batch and single disagree: {other:?}"),
                }
            }
        }
    }
}

#[tokio::test]
async fn single_item_batch_equals_embed() {
    let embedder = HashingEmbedder::new(64).unwrap();
    let single = embedder.embed("personal loan tenure").await.unwrap();
    let batch = embedder.embed_batch(&["personal loan tenure"]).await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].as_ref().unwrap(), &single);
}

#[tokio::test]
async fn batch_failures_are_per_item() {
    let embedder = TableEmbedder::new("table-v1", 2).with("a", vec![1.0, 0.0]).with("c", vec![0.0, 1.0]);
    let results = embedder.embed_batch(&["a", "", "c", "unknown"]).await;

    assert_eq!(results[0].as_ref().unwrap(), &vec![1.0, 0.0]);
    assert!(matches!(results[1], Err(RagError::EmptyInput)));
    assert_eq!(results[2].as_ref().unwrap(), &vec![0.0, 1.0]);
    assert!(matches!(results[3], Err(RagError::EmbeddingError { .. })));
}

#[tokio::test]
async fn hashing_model_version_encodes_dimensions() {
    let embedder = HashingEmbedder::new(384).unwrap();
    assert_eq!(embedder.model_version(), "hashing-v1/384");
    assert_eq!(embedder.dimensions(), 384);
    assert_eq!(embedder.embed("x").await.unwrap().len(), 384);
}
