//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`] — splits at natural boundaries (paragraphs, lines,
//!   sentences, clauses, words) before falling back to character windows
//! - [`FixedSizeChunker`] — splits by character count with configurable overlap

use crate::document::{Chunk, Document};

/// Boundary ladder tried in priority order; the empty string means
/// character-level splitting.
const DEFAULT_SEPARATORS: [&str; 8] = ["\n\n", "\n", ".", "!", "?", ",", " ", ""];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text. Identical
    /// input and parameters always produce an identical chunk sequence.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text at natural boundaries, falling through a separator ladder.
///
/// Each separator is tried in priority order; pieces still longer than the
/// budget are split again with the next separator, down to character-level
/// splitting. Separators stay attached to the preceding piece, so no
/// characters are ever lost. Accepted pieces are merged greedily and each
/// chunk after the first repeats `chunk_overlap` characters from the tail
/// of its predecessor.
///
/// The merge budget is `chunk_size - chunk_overlap` so that the overlap
/// prefix never pushes a chunk past `chunk_size`. Only a piece that cannot
/// be split by any separator in the ladder may exceed the limit; it is
/// emitted as an oversized chunk rather than dropped.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the default separator ladder.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between
    ///   consecutive chunks; must be less than `chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator ladder.
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    /// Budget for the non-overlapping part of a chunk.
    fn merge_budget(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        if text.is_empty() {
            return Vec::new();
        }

        let budget = self.merge_budget();
        let mut pieces = Vec::new();
        split_range(text, 0, text.len(), budget, &self.separators, &mut pieces);

        // Greedy merge of adjacent pieces up to the budget. Pieces are
        // contiguous spans, so extending a group is extending its end.
        let mut groups: Vec<(usize, usize)> = Vec::new();
        for (piece_start, piece_end) in pieces {
            match groups.last_mut() {
                Some((group_start, group_end)) if piece_end - *group_start <= budget => {
                    *group_end = piece_end;
                }
                _ => groups.push((piece_start, piece_end)),
            }
        }

        groups
            .iter()
            .enumerate()
            .map(|(i, &(group_start, group_end))| {
                let chunk_start = if i == 0 {
                    group_start
                } else {
                    step_back_chars(text, group_start, self.chunk_overlap)
                };
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), i.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    text: text[chunk_start..group_end].to_string(),
                    source_document_id: document.id.clone(),
                    offset: chunk_start,
                    metadata,
                }
            })
            .collect()
    }
}

/// Split `text[start..end]` into pieces no longer than `budget` bytes,
/// trying each separator in order. A piece that no remaining separator can
/// split is kept whole.
fn split_range(
    text: &str,
    start: usize,
    end: usize,
    budget: usize,
    separators: &[String],
    out: &mut Vec<(usize, usize)>,
) {
    if end - start <= budget {
        out.push((start, end));
        return;
    }
    let Some((separator, rest)) = separators.split_first() else {
        // Atomic piece longer than the budget: emit rather than drop.
        out.push((start, end));
        return;
    };

    if separator.is_empty() {
        split_chars(text, start, end, budget, out);
        return;
    }

    let mut pieces: Vec<(usize, usize)> = Vec::new();
    let mut piece_start = start;
    while let Some(pos) = text[piece_start..end].find(separator.as_str()) {
        let sep_end = piece_start + pos + separator.len();
        pieces.push((piece_start, sep_end));
        piece_start = sep_end;
    }
    if piece_start < end {
        pieces.push((piece_start, end));
    }

    if pieces.len() <= 1 {
        // Separator absent in this span; fall through to the next one.
        split_range(text, start, end, budget, rest, out);
        return;
    }

    for (piece_start, piece_end) in pieces {
        if piece_end - piece_start <= budget {
            out.push((piece_start, piece_end));
        } else {
            split_range(text, piece_start, piece_end, budget, rest, out);
        }
    }
}

/// Character-level fallback: cut every `budget` bytes, respecting char
/// boundaries. A single char wider than the budget is emitted whole.
fn split_chars(text: &str, start: usize, end: usize, budget: usize, out: &mut Vec<(usize, usize)>) {
    let mut piece_start = start;
    for (i, ch) in text[start..end].char_indices() {
        let char_start = start + i;
        let char_end = char_start + ch.len_utf8();
        if char_end - piece_start > budget && char_start > piece_start {
            out.push((piece_start, char_start));
            piece_start = char_start;
        }
    }
    if piece_start < end {
        out.push((piece_start, end));
    }
}

/// Walk back up to `count` characters from byte position `pos`.
fn step_back_chars(text: &str, pos: usize, count: usize) -> usize {
    text[..pos]
        .char_indices()
        .rev()
        .take(count)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos)
}

/// Splits text into fixed-size character windows with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk
/// inherits the parent document's metadata plus a `chunk_index` field.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between
    ///   consecutive chunks; must be less than `chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        if text.is_empty() {
            return Vec::new();
        }

        // Windows advance in characters so multi-byte chars never split.
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        let total_chars = boundaries.len() - 1;

        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut chunks = Vec::new();
        let mut start_char = 0;
        let mut chunk_index = 0;

        while start_char < total_chars {
            let end_char = (start_char + self.chunk_size).min(total_chars);
            let (byte_start, byte_end) = (boundaries[start_char], boundaries[end_char]);

            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), chunk_index.to_string());
            chunks.push(Chunk {
                id: format!("{}_{chunk_index}", document.id),
                text: text[byte_start..byte_end].to_string(),
                source_document_id: document.id.clone(),
                offset: byte_start,
                metadata,
            });

            chunk_index += 1;
            start_char += step;
        }

        chunks
    }
}
