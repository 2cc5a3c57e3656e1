//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur in the retrieval-and-generation pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation, including invalid
    /// input text (empty, or longer than the backend accepts).
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation capability failed. Eligible for bounded retry.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector's length does not match the index's configured dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the index was constructed with.
        expected: usize,
        /// The dimension of the offending vector.
        actual: usize,
    },

    /// A search was issued before any documents were indexed.
    #[error("Search issued against an empty index")]
    EmptyIndex,

    /// Vectors were added to a clustered index before training it.
    #[error("Index must be trained before vectors can be added")]
    IndexNotTrained,

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in pipeline orchestration, including lock-step consistency
    /// violations between the index and its chunk sequence.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// An I/O error from snapshot or log persistence.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A serialization error from snapshot or log persistence.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
