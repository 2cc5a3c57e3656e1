//! Answer generation: capability trait, batching, retry, post-processing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use tracing::{debug, warn};

use crate::document::GenerationRequest;
use crate::error::{RagError, Result};
use crate::prompt::PromptBuilder;

/// Canonical marker for an answer the model could not ground in context.
///
/// Post-processing collapses any "cannot find" phrasing to this exact
/// sentence so downstream metrics can count unanswered queries reliably.
pub const NO_ANSWER_MARKER: &str = "I cannot find this information in the provided context.";

/// A text-generation capability.
///
/// Implementations wrap specific generation backends behind a unified async
/// interface. External failures (including backend-imposed timeouts) must
/// surface as [`RagError::GenerationError`], which the [`Generator`]
/// retries with bounded backoff.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, max_length: usize, temperature: f32) -> Result<String>;
}

/// Knobs for the [`Generator`].
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Prompt length budget in characters; context is truncated from the
    /// lowest-ranked chunk upward to fit it.
    pub max_length: usize,
    /// Sampling temperature passed to the backend.
    pub temperature: f32,
    /// Maximum number of requests submitted to the backend as one group.
    pub batch_size: usize,
    /// Retries after a failed backend call before giving up.
    pub max_retries: usize,
    /// Initial backoff between retries; doubles per attempt.
    pub retry_backoff: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: 1024,
            temperature: 0.7,
            batch_size: 8,
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// A generated answer together with the exact prompt that produced it.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The truncated prompt sent to the backend.
    pub prompt: String,
    /// The post-processed answer.
    pub answer: String,
}

/// Batched answer generation over a [`GenerationProvider`].
pub struct Generator {
    provider: Arc<dyn GenerationProvider>,
    prompt_builder: PromptBuilder,
    config: GenerationConfig,
}

impl Generator {
    /// Create a new generator over the given provider.
    pub fn new(provider: Arc<dyn GenerationProvider>, config: GenerationConfig) -> Self {
        Self { provider, prompt_builder: PromptBuilder::new(), config }
    }

    /// The generator's configuration.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Render the truncated prompt for a request without generating.
    pub fn render_prompt(&self, request: &GenerationRequest) -> String {
        self.prompt_builder.build_truncated(
            &request.question,
            &request.context,
            self.config.max_length,
        )
    }

    /// Generate and post-process an answer for a raw prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let raw = self.generate_with_retry(prompt).await?;
        Ok(normalize_answer(&raw))
    }

    /// Answer a single request: truncated prompt, generation,
    /// post-processing.
    pub async fn answer(&self, request: &GenerationRequest) -> Result<Generation> {
        let prompt = self.render_prompt(request);
        let answer = self.generate(&prompt).await?;
        Ok(Generation { prompt, answer })
    }

    /// Answer a batch of requests.
    ///
    /// The input is partitioned into contiguous groups of at most
    /// `batch_size`; requests within a group run concurrently. The output
    /// is 1:1 with the input and order-identical regardless of completion
    /// order, so grouping is a throughput choice, never a behavior change.
    pub async fn answer_batch(&self, requests: &[GenerationRequest]) -> Result<Vec<Generation>> {
        let group_size = self.config.batch_size.max(1);
        let mut generations = Vec::with_capacity(requests.len());
        for group in requests.chunks(group_size) {
            debug!(group_size = group.len(), "submitting generation group");
            let answers = future::join_all(group.iter().map(|request| self.answer(request))).await;
            for answer in answers {
                generations.push(answer?);
            }
        }
        Ok(generations)
    }

    async fn generate_with_retry(&self, prompt: &str) -> Result<String> {
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 0;
        loop {
            match self
                .provider
                .generate(prompt, self.config.max_length, self.config.temperature)
                .await
            {
                Ok(raw) => return Ok(raw),
                Err(error @ RagError::GenerationError { .. })
                    if attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Trim and normalize a raw model answer.
///
/// Any answer containing the "cannot find" phrasing, whatever its casing,
/// collapses to [`NO_ANSWER_MARKER`].
pub fn normalize_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.to_lowercase().contains("cannot find") {
        NO_ANSWER_MARKER.to_string()
    } else {
        trimmed.to_string()
    }
}
