//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the full index-and-query workflow by
//! composing an [`EmbeddingProvider`], a [`GenerationProvider`], a
//! [`Chunker`], and a [`VectorIndex`] strategy.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{Document, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_model))
//!     .build()?;
//!
//! pipeline.index_documents(&documents).await?;
//! let response = pipeline.query("When did it happen?").await?;
//! println!("{}", response.answer);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Document, GenerationRequest, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::eval::{LogRecord, Metrics, QueryLog};
use crate::generation::{Generation, GenerationConfig, GenerationProvider, Generator};
use crate::index::{IndexKind, VectorIndex};
use crate::retriever::Retriever;

/// A retrieved chunk's text and similarity score, as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The chunk text.
    pub text: String,
    /// The similarity score in `(0, 1]`.
    pub score: f32,
}

/// The answer to one query, with its supporting context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The input question.
    pub question: String,
    /// Retrieved chunks in descending score order.
    pub retrieved_chunks: Vec<ScoredChunk>,
    /// The generated answer.
    pub answer: String,
}

/// The RAG pipeline orchestrator.
///
/// Index construction is a batch phase:
/// [`index_documents`](RagPipeline::index_documents) builds a complete new
/// retriever and publishes it with an atomic swap, so concurrent queries
/// only ever see a fully built index. Queries share the published retriever
/// read-only; the log serializes its own appends.
pub struct RagPipeline {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    generator: Generator,
    index_kind: IndexKind,
    retriever: RwLock<Option<Retriever>>,
    log: QueryLog,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Number of chunks in the published index, `0` before the first build.
    pub async fn chunk_count(&self) -> usize {
        self.retriever.read().await.as_ref().map_or(0, Retriever::len)
    }

    /// Chunk, embed, and index a document corpus, then publish the result.
    ///
    /// The new index is built completely — including IVF training on the
    /// full embedding set — before it replaces the previous one, so a
    /// build-phase failure leaves the published index untouched and no
    /// partially-indexed state is ever visible. Returns the number of
    /// indexed chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] when embedding or index
    /// construction fails, including the failing document count in the
    /// message.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<usize> {
        let mut chunks = Vec::new();
        for document in documents {
            chunks.extend(self.chunker.chunk(document));
        }
        if chunks.is_empty() {
            info!(documents = documents.len(), "nothing to index");
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.map_err(|e| {
            error!(documents = documents.len(), error = %e, "embedding failed during index build");
            RagError::PipelineError(format!(
                "embedding failed while indexing {} documents: {e}",
                documents.len()
            ))
        })?;

        let mut index = VectorIndex::new(self.embedder.dimensions(), self.index_kind.clone())?;
        index.train(&embeddings)?;
        index.add(&embeddings)?;

        let retriever = Retriever::new(Arc::clone(&self.embedder), index, chunks)?;
        let chunk_count = retriever.len();

        *self.retriever.write().await = Some(retriever);
        info!(documents = documents.len(), chunk_count, "indexed documents");
        Ok(chunk_count)
    }

    /// Answer one question: retrieve, prompt, generate, log.
    ///
    /// An empty retrieval set (everything under the score threshold) still
    /// flows through the empty-context prompt, which steers the model to
    /// the canonical cannot-find answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] before the first index build, and
    /// propagates embedding and generation failures per query without
    /// affecting the published index.
    pub async fn query(&self, question: &str) -> Result<QueryResponse> {
        let results = {
            let guard = self.retriever.read().await;
            let retriever = guard.as_ref().ok_or(RagError::EmptyIndex)?;
            retriever.search(question, self.config.top_k, self.config.score_threshold).await?
        };

        let request = GenerationRequest {
            question: question.to_string(),
            context: results.iter().map(|r| r.chunk.clone()).collect(),
        };
        let generation = self.generator.answer(&request).await?;

        self.log_exchange(question, &results, &generation).await?;
        info!(result_count = results.len(), "query answered");

        Ok(QueryResponse {
            question: question.to_string(),
            retrieved_chunks: results
                .into_iter()
                .map(|r| ScoredChunk { text: r.chunk.text, score: r.score })
                .collect(),
            answer: generation.answer,
        })
    }

    /// Answer a batch of questions.
    ///
    /// Retrieval runs per question; generation goes through the
    /// generator's grouped batching. Responses are 1:1 and order-identical
    /// with the input.
    pub async fn query_batch(&self, questions: &[String]) -> Result<Vec<QueryResponse>> {
        let mut retrievals = Vec::with_capacity(questions.len());
        {
            let guard = self.retriever.read().await;
            let retriever = guard.as_ref().ok_or(RagError::EmptyIndex)?;
            for question in questions {
                retrievals.push(
                    retriever
                        .search(question, self.config.top_k, self.config.score_threshold)
                        .await?,
                );
            }
        }

        let requests: Vec<GenerationRequest> = questions
            .iter()
            .zip(&retrievals)
            .map(|(question, results)| GenerationRequest {
                question: question.clone(),
                context: results.iter().map(|r| r.chunk.clone()).collect(),
            })
            .collect();

        let generations = self.generator.answer_batch(&requests).await?;

        let mut responses = Vec::with_capacity(questions.len());
        for ((question, results), generation) in
            questions.iter().zip(retrievals).zip(generations)
        {
            self.log_exchange(question, &results, &generation).await?;
            responses.push(QueryResponse {
                question: question.clone(),
                retrieved_chunks: results
                    .into_iter()
                    .map(|r| ScoredChunk { text: r.chunk.text, score: r.score })
                    .collect(),
                answer: generation.answer,
            });
        }
        info!(batch_size = responses.len(), "batch answered");
        Ok(responses)
    }

    /// All logged query/answer exchanges, oldest first.
    pub async fn logs(&self) -> Vec<LogRecord> {
        self.log.records().await
    }

    /// Metrics recomputed over the full log.
    pub async fn metrics(&self) -> Metrics {
        self.log.metrics().await
    }

    /// Persist the published index and chunk sequence as one unit.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] before the first index build.
    pub async fn save_index(&self, path: impl AsRef<Path>) -> Result<()> {
        let guard = self.retriever.read().await;
        let retriever = guard.as_ref().ok_or(RagError::EmptyIndex)?;
        retriever.save(path.as_ref())
    }

    /// Load a snapshot and publish it, replacing any current index.
    ///
    /// Returns the number of indexed chunks.
    pub async fn load_index(&self, path: impl AsRef<Path>) -> Result<usize> {
        let retriever = Retriever::load(path.as_ref(), Arc::clone(&self.embedder))?;
        let chunk_count = retriever.len();
        *self.retriever.write().await = Some(retriever);
        Ok(chunk_count)
    }

    async fn log_exchange(
        &self,
        question: &str,
        results: &[SearchResult],
        generation: &Generation,
    ) -> Result<()> {
        self.log
            .record(LogRecord {
                timestamp: Utc::now(),
                question: question.to_string(),
                retrieved_chunks: results.iter().map(|r| r.chunk.text.clone()).collect(),
                retrieval_scores: results.iter().map(|r| r.score).collect(),
                prompt: generation.prompt.clone(),
                generated_answer: generation.answer.clone(),
            })
            .await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding and generation providers are required; everything else
/// has a default (recursive chunker sized from the config, flat index,
/// in-memory log).
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    index_kind: Option<IndexKind>,
    log_path: Option<PathBuf>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the vector index strategy.
    pub fn index_kind(mut self, kind: IndexKind) -> Self {
        self.index_kind = Some(kind);
        self
    }

    /// Back the query log with a JSONL file, replaying existing records.
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Build the [`RagPipeline`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a provider is missing, and
    /// propagates log-file errors.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let index_kind = self.index_kind.unwrap_or(IndexKind::Flat);
        let log = match self.log_path {
            Some(path) => QueryLog::open(&path)?,
            None => QueryLog::new(),
        };

        let generation_config = GenerationConfig {
            max_length: config.max_length,
            temperature: config.temperature,
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        };
        let generator = Generator::new(generation_provider, generation_config);

        Ok(RagPipeline {
            config,
            embedder,
            chunker,
            generator,
            index_kind,
            retriever: RwLock::new(None),
            log,
        })
    }
}
