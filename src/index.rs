//! Vector index with exact and approximate nearest-neighbor search.
//!
//! Both strategies live behind one interface ([`add`](VectorIndex::add),
//! [`train`](VectorIndex::train), [`search`](VectorIndex::search)) so
//! callers stay agnostic to which backend is active. [`IndexKind::Flat`]
//! scans every stored vector and is always exact; [`IndexKind::IvfFlat`]
//! partitions vectors into clusters at train time and scans only the most
//! promising ones, trading recall for speed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RagError, Result};

/// Lloyd iterations used when training a clustered index.
const KMEANS_ITERATIONS: usize = 20;

/// Search strategy chosen at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Brute-force scan over every stored vector.
    Flat,
    /// Inverted-file index: `nlist` clusters derived at train time; a
    /// search scans the `nprobe` nearest clusters.
    IvfFlat {
        /// Number of clusters.
        nlist: usize,
        /// Number of clusters visited per search.
        nprobe: usize,
    },
}

/// An in-process vector index over squared-L2 distance.
///
/// Vector positions are assigned in insertion order and never reused; the
/// vector count is monotonically non-decreasing (no delete). The index is
/// serializable so it can be persisted together with the chunk sequence it
/// is kept in lock-step with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    dimensions: usize,
    kind: IndexKind,
    vectors: Vec<Vec<f32>>,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<usize>>,
    trained: bool,
}

impl VectorIndex {
    /// Create an index for vectors of the given dimension.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `dimensions` is zero, or if an
    /// IVF kind has a zero `nlist` or `nprobe`.
    pub fn new(dimensions: usize, kind: IndexKind) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError(
                "index dimensions must be greater than zero".to_string(),
            ));
        }
        if let IndexKind::IvfFlat { nlist, nprobe } = &kind {
            if *nlist == 0 || *nprobe == 0 {
                return Err(RagError::ConfigError(
                    "nlist and nprobe must be greater than zero".to_string(),
                ));
            }
        }
        let trained = matches!(kind, IndexKind::Flat);
        Ok(Self {
            dimensions,
            kind,
            vectors: Vec::new(),
            centroids: Vec::new(),
            lists: Vec::new(),
            trained,
        })
    }

    /// Create an exact brute-force index.
    pub fn flat(dimensions: usize) -> Result<Self> {
        Self::new(dimensions, IndexKind::Flat)
    }

    /// Create a clustered approximate index.
    pub fn ivf_flat(dimensions: usize, nlist: usize, nprobe: usize) -> Result<Self> {
        Self::new(dimensions, IndexKind::IvfFlat { nlist, nprobe })
    }

    /// The configured vector dimension.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The search strategy this index was constructed with.
    pub fn kind(&self) -> &IndexKind {
        &self.kind
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Whether the index is ready to accept vectors and answer searches.
    ///
    /// Always `true` for the flat variant; `true` for IVF only after
    /// [`train`](VectorIndex::train).
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Train the index on a representative sample of vectors.
    ///
    /// A no-op for the flat variant. For IVF this runs a deterministic
    /// k-means over the sample to derive the cluster centroids; evenly
    /// spaced sample points seed the centroids, so identical samples always
    /// produce identical clusters.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] on an empty sample and
    /// [`RagError::DimensionMismatch`] on a wrong-sized vector.
    pub fn train(&mut self, sample: &[Vec<f32>]) -> Result<()> {
        let nlist = match self.kind {
            IndexKind::IvfFlat { nlist, .. } => nlist,
            IndexKind::Flat => return Ok(()),
        };
        if sample.is_empty() {
            return Err(RagError::ConfigError(
                "cannot train a clustered index on an empty sample".to_string(),
            ));
        }
        for vector in sample {
            self.check_dimensions(vector)?;
        }

        self.centroids = k_means(sample, nlist, KMEANS_ITERATIONS);
        self.lists = vec![Vec::new(); self.centroids.len()];
        self.trained = true;
        debug!(clusters = self.centroids.len(), sample_size = sample.len(), "trained index");
        Ok(())
    }

    /// Append vectors to the index.
    ///
    /// IVF assigns each vector to its nearest centroid's posting list.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotTrained`] when adding to an untrained
    /// IVF index and [`RagError::DimensionMismatch`] on a wrong-sized
    /// vector; in both cases nothing is added.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if !self.trained {
            return Err(RagError::IndexNotTrained);
        }
        for vector in vectors {
            self.check_dimensions(vector)?;
        }

        for vector in vectors {
            let position = self.vectors.len();
            if matches!(self.kind, IndexKind::IvfFlat { .. }) {
                let list = nearest_centroid(&self.centroids, vector);
                self.lists[list].push(position);
            }
            self.vectors.push(vector.clone());
        }
        Ok(())
    }

    /// Return the `k` nearest stored vectors as `(position, distance)`
    /// pairs in ascending distance order, ties broken by insertion order.
    ///
    /// Distances are squared L2. Searching an untrained IVF index returns
    /// an empty result; callers should check
    /// [`is_trained`](VectorIndex::is_trained).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimensions(query)?;

        let candidates: Vec<usize> = match &self.kind {
            IndexKind::Flat => (0..self.vectors.len()).collect(),
            IndexKind::IvfFlat { nprobe, .. } => {
                if !self.trained {
                    return Ok(Vec::new());
                }
                let mut order: Vec<usize> = (0..self.centroids.len()).collect();
                order.sort_by(|&a, &b| {
                    squared_l2(&self.centroids[a], query)
                        .partial_cmp(&squared_l2(&self.centroids[b], query))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                order
                    .into_iter()
                    .take(*nprobe)
                    .flat_map(|cluster| self.lists[cluster].iter().copied())
                    .collect()
            }
        };

        let mut scored: Vec<(usize, f32)> = candidates
            .into_iter()
            .map(|position| (position, squared_l2(&self.vectors[position], query)))
            .collect();
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Deterministic k-means: centroids start at evenly spaced sample points
/// and Lloyd iterations run until assignments stabilize. Clusters that end
/// up empty keep their previous centroid.
fn k_means(sample: &[Vec<f32>], k: usize, max_iterations: usize) -> Vec<Vec<f32>> {
    let k = k.min(sample.len()).max(1);
    let dimensions = sample[0].len();

    let step = (sample.len() / k).max(1);
    let mut centroids: Vec<Vec<f32>> =
        (0..k).map(|i| sample[(i * step).min(sample.len() - 1)].clone()).collect();
    let mut assignments = vec![0usize; sample.len()];

    for _ in 0..max_iterations {
        let mut changed = false;
        for (i, vector) in sample.iter().enumerate() {
            let best = nearest_centroid(&centroids, vector);
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0f32; dimensions]; k];
        let mut counts = vec![0usize; k];
        for (i, vector) in sample.iter().enumerate() {
            counts[assignments[i]] += 1;
            for (j, value) in vector.iter().enumerate() {
                sums[assignments[i]][j] += value;
            }
        }
        for cluster in 0..k {
            if counts[cluster] > 0 {
                for j in 0..dimensions {
                    centroids[cluster][j] = sums[cluster][j] / counts[cluster] as f32;
                }
            }
        }
    }

    centroids
}

/// Index of the centroid nearest to `vector`; first wins on ties.
fn nearest_centroid(centroids: &[Vec<f32>], vector: &[f32]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            squared_l2(a, vector)
                .partial_cmp(&squared_l2(b, vector))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Squared Euclidean distance between two equal-length vectors.
pub(crate) fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
