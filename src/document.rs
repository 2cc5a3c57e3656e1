//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document containing text content and metadata.
///
/// Documents are created at ingestion and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new() }
    }
}

/// A contiguous segment of a [`Document`]'s text.
///
/// Derived deterministically by a chunker; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `{document_id}_{chunk_index}`.
    pub id: String,
    /// The text content of the chunk, including any overlap prefix.
    pub text: String,
    /// The ID of the parent [`Document`].
    pub source_document_id: String,
    /// Byte offset of this chunk's text within the parent document.
    pub offset: usize,
    /// Key-value metadata inherited from the parent document plus
    /// chunk-specific fields.
    pub metadata: HashMap<String, String>,
}

/// A retrieved [`Chunk`] paired with its raw distance and similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Raw squared-L2 distance reported by the index.
    pub distance: f32,
    /// Distance-derived similarity in `(0, 1]`; higher is more relevant.
    pub score: f32,
}

/// A question together with its ranked context chunks, ready for answer
/// generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The question to answer.
    pub question: String,
    /// Context chunks in descending relevance order.
    pub context: Vec<Chunk>,
}
