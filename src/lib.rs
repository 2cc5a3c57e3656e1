//! # docrag
//!
//! Retrieval-augmented question answering over private document corpora.
//!
//! ## Overview
//!
//! Documents are split into overlapping chunks, embedded into fixed-
//! dimension vectors, and stored in an in-process [`VectorIndex`] (exact
//! flat scan or approximate clustered search). At query time the
//! [`Retriever`] embeds the question, searches the index, and converts raw
//! distances into bounded similarity scores; the [`PromptBuilder`]
//! assembles a deterministic instruction prompt from the ranked context;
//! the [`Generator`] batches prompts through a text-generation backend and
//! post-processes the answers; and every exchange lands in an append-only
//! [`QueryLog`] from which evaluation [`Metrics`] are derived on demand.
//!
//! The embedding and generation models are consumed purely through the
//! [`EmbeddingProvider`] and [`GenerationProvider`] capability traits, so
//! the whole pipeline can run against deterministic stubs (see [`mock`])
//! or any HTTP backend (see [`openai`], behind the `openai` feature).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{Document, RagConfig, RagPipeline};
//! use docrag::openai::{OpenAIEmbeddingProvider, OpenAIGenerationProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::builder().chunk_size(512).chunk_overlap(100).build()?)
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .generation_provider(Arc::new(OpenAIGenerationProvider::from_env()?))
//!     .build()?;
//!
//! pipeline.index_documents(&[Document::new("guide", guide_text)]).await?;
//!
//! let response = pipeline.query("How do I rotate the API key?").await?;
//! for chunk in &response.retrieved_chunks {
//!     println!("[{:.3}] {}", chunk.score, chunk.text);
//! }
//! println!("{}", response.answer);
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod generation;
pub mod index;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, GenerationRequest, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use eval::{LogRecord, Metrics, QueryLog};
pub use generation::{
    Generation, GenerationConfig, GenerationProvider, Generator, NO_ANSWER_MARKER,
    normalize_answer,
};
pub use index::{IndexKind, VectorIndex};
pub use pipeline::{QueryResponse, RagPipeline, RagPipelineBuilder, ScoredChunk};
pub use prompt::PromptBuilder;
pub use retriever::Retriever;
