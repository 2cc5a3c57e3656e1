//! Behavior and property tests for query-time retrieval.

use std::collections::HashMap;
use std::sync::Arc;

use docrag::document::Chunk;
use docrag::index::VectorIndex;
use docrag::mock::MockEmbedder;
use docrag::retriever::Retriever;
use docrag::{EmbeddingProvider, RagError};
use proptest::prelude::*;

fn chunk(i: usize, text: &str) -> Chunk {
    Chunk {
        id: format!("doc_1_{i}"),
        text: text.to_string(),
        source_document_id: "doc_1".to_string(),
        offset: 0,
        metadata: HashMap::new(),
    }
}

/// Index the given texts through a mock embedder and wrap them in a
/// retriever.
async fn retriever_over(
    embedder: Arc<MockEmbedder>,
    texts: &[&str],
) -> Retriever {
    let mut index = VectorIndex::flat(embedder.dimensions()).unwrap();
    let mut chunks = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        let embedding = embedder.embed(text).await.unwrap();
        index.add(&[embedding]).unwrap();
        chunks.push(chunk(i, text));
    }
    Retriever::new(embedder, index, chunks).unwrap()
}

#[tokio::test]
async fn empty_index_search_fails() {
    let embedder = Arc::new(MockEmbedder::new(4));
    let retriever = retriever_over(embedder, &[]).await;
    assert!(matches!(retriever.search("anything", 5, 0.0).await, Err(RagError::EmptyIndex)));
}

#[tokio::test]
async fn identical_text_scores_exactly_one() {
    let embedder = Arc::new(MockEmbedder::new(8));
    let retriever = retriever_over(embedder, &["the exact same text", "something else"]).await;

    let results = retriever.search("the exact same text", 2, 0.0).await.unwrap();
    assert_eq!(results[0].chunk.text, "the exact same text");
    assert_eq!(results[0].distance, 0.0);
    assert_eq!(results[0].score, 1.0);
}

#[tokio::test]
async fn threshold_filters_low_scoring_results() {
    let embedder = Arc::new(
        MockEmbedder::new(2)
            .with_fixture("query", vec![0.0, 0.0])
            .with_fixture("near", vec![0.5, 0.0])
            .with_fixture("far", vec![4.0, 0.0]),
    );
    // near: distance 0.25 -> score 0.8; far: distance 16 -> score ~0.059
    let retriever = retriever_over(embedder, &["near match", "far match"]).await;

    let results = retriever.search("query", 5, 0.5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.text, "near match");
    assert!((results[0].score - 0.8).abs() < 1e-6);

    let all = retriever.search("query", 5, 0.0).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn a_threshold_above_every_score_yields_empty_results() {
    let embedder = Arc::new(
        MockEmbedder::new(2)
            .with_fixture("query", vec![0.0, 0.0])
            .with_fixture("best", vec![0.8165, 0.0]),
    );
    // best: distance ~0.667 -> score ~0.6
    let retriever = retriever_over(embedder, &["best available passage"]).await;

    let results = retriever.search("query", 5, 0.99).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn embedding_failure_propagates() {
    let embedder = Arc::new(MockEmbedder::new(4).with_max_input_len(16));
    let retriever = retriever_over(embedder, &["short text"]).await;

    let error = retriever
        .search("this query is much longer than sixteen characters", 3, 0.0)
        .await
        .unwrap_err();
    assert!(matches!(error, RagError::EmbeddingError { .. }));
}

#[tokio::test]
async fn lock_step_violation_is_fatal_at_construction() {
    let embedder = Arc::new(MockEmbedder::new(4));
    let mut index = VectorIndex::flat(4).unwrap();
    index.add(&[vec![0.0; 4]]).unwrap();

    // Two chunks against one vector.
    let result = Retriever::new(embedder, index, vec![chunk(0, "a"), chunk(1, "b")]);
    assert!(matches!(result, Err(RagError::PipelineError(_))));
}

#[tokio::test]
async fn mismatched_embedder_is_rejected_at_construction() {
    let embedder = Arc::new(MockEmbedder::new(4));
    let index = VectorIndex::flat(8).unwrap();
    assert!(matches!(
        Retriever::new(embedder, index, Vec::new()),
        Err(RagError::DimensionMismatch { expected: 8, actual: 4 })
    ));
}

#[tokio::test]
async fn snapshot_round_trips_as_one_unit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("retriever.json");

    let embedder = Arc::new(MockEmbedder::new(8));
    let texts = ["alpha passage", "beta passage", "gamma passage"];
    let retriever = retriever_over(Arc::clone(&embedder), &texts).await;
    retriever.save(&path).unwrap();

    let restored = Retriever::load(&path, embedder.clone()).unwrap();
    assert_eq!(restored.len(), retriever.len());

    let before = retriever.search("beta passage", 3, 0.0).await.unwrap();
    let after = restored.search("beta passage", 3, 0.0).await.unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.chunk, a.chunk);
        assert_eq!(b.score, a.score);
    }

    // A snapshot from one model must not load against another.
    let other = Arc::new(MockEmbedder::new(16));
    assert!(matches!(
        Retriever::load(&path, other),
        Err(RagError::DimensionMismatch { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Result count is bounded by `top_k`, scores decrease monotonically,
    /// and every score lies in `(0, 1]`.
    #[test]
    fn search_results_are_bounded_ordered_and_in_range(
        texts in proptest::collection::vec("[a-z]{4,20}", 1..16),
        query in "[a-z]{4,20}",
        top_k in 1usize..20,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let results = rt.block_on(async {
            let embedder = Arc::new(MockEmbedder::new(8));
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let retriever = retriever_over(embedder, &refs).await;
            retriever.search(&query, top_k, 0.0).await.unwrap()
        });

        prop_assert!(results.len() <= top_k);
        prop_assert!(results.len() <= texts.len());
        for result in &results {
            prop_assert!(result.score > 0.0 && result.score <= 1.0);
        }
        for window in results.windows(2) {
            prop_assert!(
                window[0].score >= window[1].score,
                "results not in descending order: {} < {}",
                window[0].score,
                window[1].score,
            );
        }
    }
}
