//! Deterministic test doubles for the embedding and generation capabilities.
//!
//! Exported as a first-class module so downstream crates can exercise the
//! pipeline without live model backends.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;

/// Deterministic embedder: fixture substrings map to fixed vectors, any
/// other input hashes to a stable pseudo-random vector.
pub struct MockEmbedder {
    dimensions: usize,
    max_input_len: Option<usize>,
    fixtures: Vec<(String, Vec<f32>)>,
}

impl MockEmbedder {
    /// Create a mock embedder producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, max_input_len: None, fixtures: Vec::new() }
    }

    /// Map any input containing `needle` to `vector`.
    ///
    /// Fixtures are matched in insertion order. The vector length must
    /// equal the embedder's dimensions.
    pub fn with_fixture(mut self, needle: impl Into<String>, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimensions, "fixture vector dimension");
        self.fixtures.push((needle.into(), vector));
        self
    }

    /// Reject inputs longer than `max` characters, mimicking a backend's
    /// input-length capability.
    pub fn with_max_input_len(mut self, max: usize) -> Self {
        self.max_input_len = Some(max);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::EmbeddingError {
                provider: "Mock".to_string(),
                message: "input text is empty".to_string(),
            });
        }
        if let Some(max) = self.max_input_len {
            if text.chars().count() > max {
                return Err(RagError::EmbeddingError {
                    provider: "Mock".to_string(),
                    message: format!("input exceeds {max} characters"),
                });
            }
        }
        for (needle, vector) in &self.fixtures {
            if text.contains(needle) {
                return Ok(vector.clone());
            }
        }
        Ok(hash_vector(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Stable pseudo-random vector with components in `[-1, 1]`.
fn hash_vector(text: &str, dimensions: usize) -> Vec<f32> {
    (0..dimensions)
        .map(|component| {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            component.hash(&mut hasher);
            (hasher.finish() as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
        })
        .collect()
}

/// Scripted generator: prompt substrings map to canned replies.
///
/// Defaults to the raw "cannot find" refusal, and can inject transient
/// failures to exercise retry handling.
pub struct MockGenerator {
    replies: Vec<(String, String)>,
    default_reply: String,
    failures: AtomicUsize,
}

impl MockGenerator {
    /// Create a mock generator that always replies "cannot find".
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            default_reply: "cannot find".to_string(),
            failures: AtomicUsize::new(0),
        }
    }

    /// Reply with `reply` whenever the prompt contains `needle`.
    ///
    /// Replies are matched in insertion order.
    pub fn with_reply(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.push((needle.into(), reply.into()));
        self
    }

    /// Replace the fallback reply.
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    /// Fail the next `count` calls before succeeding.
    pub fn failing(self, count: usize) -> Self {
        self.failures.store(count, Ordering::SeqCst);
        self
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationProvider for MockGenerator {
    async fn generate(&self, prompt: &str, _max_length: usize, _temperature: f32) -> Result<String> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RagError::GenerationError {
                provider: "Mock".to_string(),
                message: "injected transient failure".to_string(),
            });
        }
        for (needle, reply) in &self.replies {
            if prompt.contains(needle) {
                return Ok(reply.clone());
            }
        }
        Ok(self.default_reply.clone())
    }
}
