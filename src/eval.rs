//! Query/answer logging and derived evaluation metrics.
//!
//! Every answered query is appended to a [`QueryLog`]; aggregate
//! [`Metrics`] are recomputed from the full record sequence on every read
//! rather than maintained incrementally, so the log is the single source of
//! truth.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::generation::NO_ANSWER_MARKER;

/// One logged query/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the query was answered.
    pub timestamp: DateTime<Utc>,
    /// The input question.
    pub question: String,
    /// Texts of the retrieved chunks, in ranking order.
    pub retrieved_chunks: Vec<String>,
    /// Similarity scores parallel to `retrieved_chunks`.
    pub retrieval_scores: Vec<f32>,
    /// The exact prompt sent to the generation backend.
    pub prompt: String,
    /// The post-processed answer.
    pub generated_answer: String,
}

/// Aggregate metrics over the full log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of logged queries.
    pub total_queries: usize,
    /// Queries that retrieved at least one chunk.
    pub queries_with_context: usize,
    /// Mean of each record's top-1 similarity score, over records that
    /// retrieved at least one chunk.
    pub mean_top_score: f32,
    /// Answers that are non-empty and not the cannot-find marker.
    pub matched: usize,
    /// Remaining answers.
    pub unmatched: usize,
    /// `matched / total` as a percentage, rounded to one decimal.
    pub accuracy_pct: f32,
}

impl Metrics {
    /// Derive metrics from a record sequence. An empty log yields zeroed
    /// metrics, never a division error.
    pub fn compute(records: &[LogRecord]) -> Self {
        let total_queries = records.len();
        if total_queries == 0 {
            return Self::default();
        }

        let queries_with_context =
            records.iter().filter(|r| !r.retrieved_chunks.is_empty()).count();

        let top_scores: Vec<f32> =
            records.iter().filter_map(|r| r.retrieval_scores.first().copied()).collect();
        let mean_top_score = if top_scores.is_empty() {
            0.0
        } else {
            top_scores.iter().sum::<f32>() / top_scores.len() as f32
        };

        let matched = records
            .iter()
            .filter(|r| !r.generated_answer.is_empty() && r.generated_answer != NO_ANSWER_MARKER)
            .count();
        let unmatched = total_queries - matched;
        let accuracy_pct = (matched as f32 / total_queries as f32 * 1000.0).round() / 10.0;

        Self {
            total_queries,
            queries_with_context,
            mean_top_score,
            matched,
            unmatched,
            accuracy_pct,
        }
    }
}

struct LogState {
    records: Vec<LogRecord>,
    file: Option<File>,
}

/// Append-only store of [`LogRecord`]s.
///
/// Appends are serialized through a mutex, so concurrent queries can log
/// without interleaving partial writes. With [`QueryLog::open`] every
/// record is also appended as one JSON line to a file, and existing lines
/// are replayed into memory first.
pub struct QueryLog {
    state: Mutex<LogState>,
}

impl QueryLog {
    /// Create an in-memory log.
    pub fn new() -> Self {
        Self { state: Mutex::new(LogState { records: Vec::new(), file: None }) }
    }

    /// Open a JSONL-backed log, replaying any existing records.
    pub fn open(path: &Path) -> Result<Self> {
        let mut records = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                records.push(serde_json::from_str(&line)?);
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), replayed = records.len(), "opened query log");
        Ok(Self { state: Mutex::new(LogState { records, file: Some(file) }) })
    }

    /// Append one record.
    pub async fn record(&self, record: LogRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(file) = state.file.as_mut() {
            let line = serde_json::to_string(&record)?;
            writeln!(file, "{line}")?;
            file.flush()?;
        }
        state.records.push(record);
        Ok(())
    }

    /// All records, oldest first.
    pub async fn records(&self) -> Vec<LogRecord> {
        self.state.lock().await.records.clone()
    }

    /// The `n` most recent records, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<LogRecord> {
        let state = self.state.lock().await;
        let skip = state.records.len().saturating_sub(n);
        state.records[skip..].to_vec()
    }

    /// Metrics recomputed over the full log.
    pub async fn metrics(&self) -> Metrics {
        Metrics::compute(&self.state.lock().await.records)
    }
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new()
    }
}
