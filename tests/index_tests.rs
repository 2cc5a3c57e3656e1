//! Behavior tests for the flat and clustered vector index variants.

use docrag::index::{IndexKind, VectorIndex};
use docrag::RagError;

fn vectors(raw: &[[f32; 2]]) -> Vec<Vec<f32>> {
    raw.iter().map(|v| v.to_vec()).collect()
}

#[test]
fn flat_search_returns_true_nearest_in_ascending_distance() {
    let mut index = VectorIndex::flat(2).unwrap();
    index.add(&vectors(&[[0.0, 0.0], [3.0, 0.0], [1.0, 0.0], [0.0, 2.0]])).unwrap();

    let hits = index.search(&[0.0, 0.0], 3).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0], (0, 0.0));
    assert_eq!(hits[1], (2, 1.0));
    assert_eq!(hits[2], (3, 4.0));
}

#[test]
fn equal_distances_break_ties_by_insertion_order() {
    let mut index = VectorIndex::flat(2).unwrap();
    index.add(&vectors(&[[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]])).unwrap();

    let hits = index.search(&[0.0, 0.0], 3).unwrap();
    let positions: Vec<usize> = hits.iter().map(|h| h.0).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[test]
fn k_larger_than_count_returns_everything() {
    let mut index = VectorIndex::flat(2).unwrap();
    index.add(&vectors(&[[1.0, 1.0]])).unwrap();
    assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 1);
}

#[test]
fn dimension_mismatch_is_rejected_everywhere() {
    let mut index = VectorIndex::flat(3).unwrap();
    assert!(matches!(
        index.add(&[vec![1.0, 2.0]]),
        Err(RagError::DimensionMismatch { expected: 3, actual: 2 })
    ));
    assert!(matches!(
        index.search(&[1.0], 1),
        Err(RagError::DimensionMismatch { expected: 3, actual: 1 })
    ));

    let mut ivf = VectorIndex::ivf_flat(3, 2, 1).unwrap();
    assert!(matches!(
        ivf.train(&[vec![1.0, 2.0, 3.0, 4.0]]),
        Err(RagError::DimensionMismatch { expected: 3, actual: 4 })
    ));
}

#[test]
fn vector_count_is_monotonic() {
    let mut index = VectorIndex::flat(2).unwrap();
    assert_eq!(index.len(), 0);
    index.add(&vectors(&[[0.0, 0.0]])).unwrap();
    assert_eq!(index.len(), 1);
    index.add(&vectors(&[[1.0, 1.0], [2.0, 2.0]])).unwrap();
    assert_eq!(index.len(), 3);
}

#[test]
fn flat_index_is_always_trained_and_train_is_a_noop() {
    let mut index = VectorIndex::flat(2).unwrap();
    assert!(index.is_trained());
    index.train(&vectors(&[[1.0, 1.0]])).unwrap();
    assert!(index.is_trained());
    assert_eq!(index.len(), 0);
}

#[test]
fn ivf_requires_training_before_add() {
    let mut index = VectorIndex::ivf_flat(2, 2, 1).unwrap();
    assert!(!index.is_trained());
    assert!(matches!(
        index.add(&vectors(&[[1.0, 1.0]])),
        Err(RagError::IndexNotTrained)
    ));
    assert_eq!(index.len(), 0);
}

#[test]
fn untrained_ivf_search_degrades_to_empty() {
    let index = VectorIndex::ivf_flat(2, 2, 1).unwrap();
    assert!(index.search(&[0.0, 0.0], 5).unwrap().is_empty());
}

#[test]
fn trained_ivf_with_full_probe_matches_flat_exactly() {
    let data = vectors(&[
        [0.1, 0.2],
        [5.0, 5.1],
        [0.3, 0.1],
        [5.2, 4.9],
        [2.5, 2.5],
        [0.0, 0.4],
    ]);

    let mut flat = VectorIndex::flat(2).unwrap();
    flat.add(&data).unwrap();

    let mut ivf = VectorIndex::ivf_flat(2, 3, 3).unwrap();
    ivf.train(&data).unwrap();
    ivf.add(&data).unwrap();
    assert!(ivf.is_trained());

    for query in [[0.0, 0.0], [5.0, 5.0], [2.4, 2.6]] {
        assert_eq!(flat.search(&query, 4).unwrap(), ivf.search(&query, 4).unwrap());
    }
}

#[test]
fn ivf_probe_restricts_search_to_nearest_clusters() {
    // Two well-separated blobs; probing one cluster must only surface
    // members of the blob nearest the query.
    let data = vectors(&[
        [0.0, 0.1],
        [0.1, 0.0],
        [0.05, 0.05],
        [9.0, 9.1],
        [9.1, 9.0],
        [8.95, 9.05],
    ]);
    let mut index = VectorIndex::ivf_flat(2, 2, 1).unwrap();
    index.train(&data).unwrap();
    index.add(&data).unwrap();

    let hits = index.search(&[9.0, 9.0], 6).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|&(position, _)| position >= 3));
}

#[test]
fn training_twice_on_identical_samples_is_deterministic() {
    let data = vectors(&[[0.0, 0.0], [1.0, 0.0], [10.0, 10.0], [11.0, 10.0]]);

    let mut first = VectorIndex::ivf_flat(2, 2, 2).unwrap();
    first.train(&data).unwrap();
    first.add(&data).unwrap();

    let mut second = VectorIndex::ivf_flat(2, 2, 2).unwrap();
    second.train(&data).unwrap();
    second.add(&data).unwrap();

    assert_eq!(first.search(&[0.5, 0.0], 4).unwrap(), second.search(&[0.5, 0.0], 4).unwrap());
}

#[test]
fn zero_sized_construction_is_rejected() {
    assert!(matches!(VectorIndex::flat(0), Err(RagError::ConfigError(_))));
    assert!(matches!(VectorIndex::ivf_flat(2, 0, 1), Err(RagError::ConfigError(_))));
    assert!(matches!(VectorIndex::ivf_flat(2, 2, 0), Err(RagError::ConfigError(_))));
    assert!(matches!(
        VectorIndex::new(2, IndexKind::IvfFlat { nlist: 4, nprobe: 2 }),
        Ok(_)
    ));
}
