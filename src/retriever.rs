//! Query-time retrieval: embed, search, score, filter.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{Chunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Retrieves scored context chunks for a query.
///
/// Owns a [`VectorIndex`] and the parallel chunk sequence whose length must
/// always equal the index's vector count — the index stores only vectors,
/// so result positions are resolved through this sequence. The constructor
/// and snapshot load verify that invariant; a violation is a fatal
/// consistency error, never repaired in place.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
    chunks: Vec<Chunk>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    index: &'a VectorIndex,
    chunks: &'a [Chunk],
}

#[derive(Deserialize)]
struct Snapshot {
    index: VectorIndex,
    chunks: Vec<Chunk>,
}

impl Retriever {
    /// Create a retriever over an index and its chunk sequence.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the chunk sequence is out of
    /// step with the index's vector count, and
    /// [`RagError::DimensionMismatch`] if the embedder's dimension differs
    /// from the index's.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: VectorIndex,
        chunks: Vec<Chunk>,
    ) -> Result<Self> {
        if chunks.len() != index.len() {
            return Err(RagError::PipelineError(format!(
                "chunk sequence ({}) out of step with index vectors ({})",
                chunks.len(),
                index.len()
            )));
        }
        if embedder.dimensions() != index.dimensions() {
            return Err(RagError::DimensionMismatch {
                expected: index.dimensions(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self { embedder, index, chunks })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing has been indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The indexed chunk sequence, in insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The underlying vector index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Retrieve up to `top_k` chunks relevant to `query`.
    ///
    /// The query is embedded, the index searched by raw distance, and each
    /// distance `d` converted to a similarity `1 / (1 + d)` — bounded in
    /// `(0, 1]`, exactly `1` for a zero distance. Results scoring below
    /// `score_threshold` are discarded; the rest are returned in descending
    /// score order, ties keeping insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] when nothing has been indexed, and
    /// propagates embedding failures.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        if self.index.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let query_embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&query_embedding, top_k)?;

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .map(|(position, distance)| SearchResult {
                chunk: self.chunks[position].clone(),
                distance,
                score: 1.0 / (1.0 + distance),
            })
            .filter(|result| result.score >= score_threshold)
            .collect();

        // Ascending distance already implies descending score; the stable
        // sort keeps insertion order for equal scores.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        debug!(query_len = query.len(), result_count = results.len(), "retriever search");
        Ok(results)
    }

    /// Persist the index and its chunk sequence as one unit.
    ///
    /// The snapshot is written to a temporary sibling file and renamed into
    /// place, so a reader never observes a partial write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = SnapshotRef { index: &self.index, chunks: &self.chunks };
        let bytes = serde_json::to_vec(&snapshot)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), vectors = self.index.len(), "saved retriever snapshot");
        Ok(())
    }

    /// Load a snapshot written by [`save`](Retriever::save).
    ///
    /// Re-validates the lock-step invariant and the embedding dimension
    /// against the supplied provider, so a snapshot from a different model
    /// is rejected instead of silently misused.
    pub fn load(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let bytes = fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        let retriever = Self::new(embedder, snapshot.index, snapshot.chunks)?;
        info!(path = %path.display(), vectors = retriever.len(), "loaded retriever snapshot");
        Ok(retriever)
    }
}
