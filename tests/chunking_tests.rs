//! Behavior and property tests for the document chunkers.

use std::collections::HashMap;

use docrag::chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
use docrag::document::Document;
use proptest::prelude::*;

fn doc(text: &str) -> Document {
    Document { id: "doc_1".to_string(), text: text.to_string(), metadata: HashMap::new() }
}

/// Rebuild the original text from a chunk sequence using each chunk's
/// offset to strip the declared overlap.
fn reconstruct(chunks: &[docrag::Chunk]) -> String {
    let mut rebuilt = String::new();
    let mut prev_end = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            rebuilt.push_str(&chunk.text);
        } else {
            let overlap_bytes = prev_end - chunk.offset;
            rebuilt.push_str(&chunk.text[overlap_bytes..]);
        }
        prev_end = chunk.offset + chunk.text.len();
    }
    rebuilt
}

#[test]
fn empty_input_yields_no_chunks() {
    let chunker = RecursiveChunker::new(100, 20);
    assert!(chunker.chunk(&doc("")).is_empty());
}

#[test]
fn identical_input_yields_identical_chunks() {
    let chunker = RecursiveChunker::new(50, 10);
    let text = "First paragraph about one topic.\n\nSecond paragraph, on another topic entirely. It runs a bit longer than the first one does.";
    let first = chunker.chunk(&doc(text));
    let second = chunker.chunk(&doc(text));
    assert_eq!(first, second);
}

#[test]
fn merges_word_pieces_and_repeats_overlap() {
    let chunker = RecursiveChunker::new(20, 5);
    let chunks = chunker.chunk(&doc("aaaa bbbb cccc dddd eeee ffff"));

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "aaaa bbbb cccc ");
    assert_eq!(chunks[0].offset, 0);
    // The second chunk repeats the 5-character tail of the first.
    assert_eq!(chunks[1].text, "cccc dddd eeee ffff");
    assert_eq!(chunks[1].offset, 10);
    assert!(chunks[0].text.ends_with("cccc "));
}

#[test]
fn chunk_ids_and_metadata_follow_the_document() {
    let mut document = doc("alpha beta gamma delta epsilon zeta eta theta");
    document.metadata.insert("source".to_string(), "notes.txt".to_string());

    let chunks = RecursiveChunker::new(20, 4).chunk(&document);
    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.id, format!("doc_1_{i}"));
        assert_eq!(chunk.source_document_id, "doc_1");
        assert_eq!(chunk.metadata.get("source").map(String::as_str), Some("notes.txt"));
        assert_eq!(chunk.metadata.get("chunk_index").map(String::as_str), Some(i.to_string().as_str()));
    }
}

#[test]
fn prefers_paragraph_boundaries() {
    let text = "Short paragraph one.\n\nShort paragraph two.\n\nShort paragraph three.";
    let chunks = RecursiveChunker::new(30, 0).chunk(&doc(text));
    // Each paragraph fits the budget on its own, so no paragraph is split
    // mid-sentence.
    assert!(chunks.iter().all(|c| c.text.len() <= 30));
    assert!(chunks[0].text.starts_with("Short paragraph one."));
}

#[test]
fn oversized_atomic_unit_is_emitted_not_dropped() {
    // Without the character-level fallback an unbroken word cannot be
    // split; it must still come through as a single oversized chunk.
    let word = "x".repeat(200);
    let chunker =
        RecursiveChunker::new(50, 10).with_separators(vec![" ".to_string()]);
    let chunks = chunker.chunk(&doc(&word));

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, word);
}

#[test]
fn character_fallback_bounds_unbroken_words() {
    // With the default ladder the character-level fallback applies.
    let word = "y".repeat(200);
    let chunks = RecursiveChunker::new(50, 10).chunk(&doc(&word));

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.text.len() <= 50));
    assert_eq!(reconstruct(&chunks), word);
}

#[test]
fn multibyte_text_splits_on_char_boundaries() {
    let text = "äöü ".repeat(40);
    let chunks = RecursiveChunker::new(32, 8).chunk(&doc(&text));
    assert!(!chunks.is_empty());
    assert_eq!(reconstruct(&chunks), text);
}

#[test]
fn fixed_size_chunker_windows_with_overlap() {
    let chunks = FixedSizeChunker::new(10, 3).chunk(&doc("abcdefghijklmnopqrst"));
    assert_eq!(chunks[0].text, "abcdefghij");
    assert_eq!(chunks[1].offset, 7);
    assert!(chunks[1].text.starts_with("hij"));
    assert!(chunks.iter().all(|c| c.text.len() <= 10));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every chunk stays within `chunk_size` when the character-level
    /// fallback is available.
    #[test]
    fn chunk_length_is_bounded(
        text in "[a-zA-Z0-9 .,!?\n]{0,400}",
        chunk_size in 8usize..64,
        overlap_frac in 0usize..8,
    ) {
        let chunk_overlap = chunk_size * overlap_frac / 8 / 2;
        let chunks = RecursiveChunker::new(chunk_size, chunk_overlap).chunk(&doc(&text));
        for chunk in &chunks {
            prop_assert!(
                chunk.text.chars().count() <= chunk_size,
                "chunk of {} chars exceeds size {}",
                chunk.text.chars().count(),
                chunk_size,
            );
        }
    }

    /// Stripping each chunk's overlap prefix and concatenating restores the
    /// original text exactly.
    #[test]
    fn chunks_reconstruct_the_document(
        text in "[a-zA-Z0-9 .,!?\n]{0,400}",
        chunk_size in 8usize..64,
        overlap_frac in 0usize..8,
    ) {
        let chunk_overlap = chunk_size * overlap_frac / 8 / 2;
        let chunks = RecursiveChunker::new(chunk_size, chunk_overlap).chunk(&doc(&text));
        prop_assert_eq!(reconstruct(&chunks), text);
    }

    /// Chunking is a pure function of its inputs.
    #[test]
    fn chunking_is_deterministic(
        text in "[a-z .\n]{0,200}",
        chunk_size in 8usize..40,
    ) {
        let chunker = RecursiveChunker::new(chunk_size, chunk_size / 4);
        prop_assert_eq!(chunker.chunk(&doc(&text)), chunker.chunk(&doc(&text)));
    }
}
