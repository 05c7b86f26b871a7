//! Recursive character chunking with corpus-wide chunk ids
//!
//! Text is split on the largest separator present (paragraph, line,
//! sentence, word) and the pieces are greedily merged back up to
//! `chunk_size` characters, carrying up to `chunk_overlap` characters into
//! the next chunk. Pieces that are still too large are split again with the
//! next separator; the empty separator is a hard per-character cut.
//!
//! All sizes are counted in `char`s. Chunks are whitespace-trimmed slices of
//! the source, so `start_index` is exact.

use std::collections::VecDeque;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkMetadata, Document};

/// Separators tried in order, largest unit first
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks of one document
    overlap: usize,
    /// Split boundaries, largest first
    separators: Vec<String>,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be positive"));
        }
        if overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator list
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Chunk a sequence of documents
    ///
    /// `chunk_id` counts across the whole call starting at 0, so ids are
    /// unique and contiguous for one ingestion run.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut next_id: u64 = 0;

        for doc in documents {
            for (content, start_index) in self.split_text(&doc.content) {
                chunks.push(Chunk {
                    content: content.to_string(),
                    metadata: ChunkMetadata::from_document(&doc.metadata, next_id, start_index),
                });
                next_id += 1;
            }
        }

        chunks
    }

    /// Split one text into `(chunk, char offset)` pairs
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<(&'a str, usize)> {
        let mut ranges = Vec::new();
        self.split_range(text, 0..text.len(), &self.separators, &mut ranges);

        let mut offsets = CharOffsets::default();
        ranges
            .into_iter()
            .map(|range| {
                let start = offsets.char_offset(text, range.start);
                (&text[range], start)
            })
            .collect()
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[String],
        out: &mut Vec<Range<usize>>,
    ) {
        let base = range.start;
        let (separator, remaining) = pick_separator(&text[range.clone()], separators);

        let mut good: Vec<Range<usize>> = Vec::new();
        for piece in split_keep_separator(&text[range], separator) {
            let piece = (piece.start + base)..(piece.end + base);

            if char_len(text, &piece) < self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                self.merge(text, &good, out);
                good.clear();
            }

            if remaining.is_empty() {
                push_trimmed(text, piece, out);
            } else {
                self.split_range(text, piece, remaining, out);
            }
        }

        if !good.is_empty() {
            self.merge(text, &good, out);
        }
    }

    /// Greedily merge adjacent pieces into chunks with overlap
    fn merge(&self, text: &str, pieces: &[Range<usize>], out: &mut Vec<Range<usize>>) {
        let mut current: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(text, piece);

            if total + len > self.chunk_size {
                if let (Some(first), Some(last)) = (current.front(), current.back()) {
                    push_trimmed(text, first.0.start..last.0.end, out);
                }

                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            current.push_back((piece.clone(), len));
            total += len;
        }

        if let (Some(first), Some(last)) = (current.front(), current.back()) {
            push_trimmed(text, first.0.start..last.0.end, out);
        }
    }
}

/// First separator present in `text`, plus the finer ones after it
fn pick_separator<'s>(text: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[i + 1..]);
        }
    }
    (separators.last().map(String::as_str).unwrap_or(""), &[])
}

/// Split into byte ranges, each separator staying at the start of the piece
/// that follows it
fn split_keep_separator(text: &str, separator: &str) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| i..i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(start..idx);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(start..text.len());
    }
    pieces
}

fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}

/// Push `range` minus surrounding whitespace, dropping blank ranges
fn push_trimmed(text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
    let slice = &text[range.clone()];
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.start + slice.trim_end().len();
    if start < end {
        out.push(start..end);
    }
}

/// Byte-to-char offset conversion for mostly increasing positions
#[derive(Default)]
struct CharOffsets {
    byte: usize,
    chars: usize,
}

impl CharOffsets {
    fn char_offset(&mut self, text: &str, byte: usize) -> usize {
        if byte < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;
    use std::path::Path;

    fn doc(name: &str, content: &str) -> Document {
        Document::new(content, Path::new(name), FileType::Txt)
    }

    fn words(count: usize) -> String {
        (0..count)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_document_is_single_chunk() {
        let chunker = TextChunker::new(800, 120).unwrap();
        let text = "The sky is blue.\n\nGrass is green.";
        let chunks = chunker.chunk_documents(&[doc("sky.txt", text)]);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].metadata.chunk_id, 0);
        assert_eq!(chunks[0].metadata.start_index, Some(0));
        assert_eq!(chunks[0].metadata.source, "sky.txt");
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = TextChunker::new(100, 10).unwrap();
        assert!(chunker.chunk_documents(&[]).is_empty());
        assert!(chunker.chunk_documents(&[doc("blank.txt", "  \n\n \t")]).is_empty());
    }

    #[test]
    fn test_chunk_ids_are_global_and_contiguous() {
        let chunker = TextChunker::new(60, 10).unwrap();
        let docs = vec![
            doc("a.txt", &words(40)),
            doc("b.txt", "tiny"),
            doc("c.txt", &words(25)),
        ];

        let chunks = chunker.chunk_documents(&docs);
        assert!(chunks.len() > 3);

        let ids: Vec<u64> = chunks.iter().map(|c| c.metadata.chunk_id).collect();
        let expected: Vec<u64> = (0..chunks.len() as u64).collect();
        assert_eq!(ids, expected);

        let tiny = chunks.iter().find(|c| c.metadata.source == "b.txt").unwrap();
        assert_eq!(tiny.content, "tiny");
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let chunker = TextChunker::new(50, 15).unwrap();
        let text = words(60);
        let pieces = chunker.split_text(&text);

        assert!(pieces.len() > 1);
        for (content, _) in &pieces {
            assert!(content.chars().count() <= 50, "oversized chunk: {:?}", content);
        }

        // Consecutive chunks share a tail/head
        for pair in pieces.windows(2) {
            let (first, first_start) = pair[0];
            let (_, second_start) = pair[1];
            let first_end = first_start + first.chars().count();
            assert!(second_start < first_end, "no overlap between {:?}", pair);
            assert!(second_start > first_start);
        }
    }

    #[test]
    fn test_start_index_points_into_source() {
        let chunker = TextChunker::new(30, 5).unwrap();
        let text = "Intro line.\n\nSecond paragraph is here.\nAnd a third line follows it.";
        let chars: Vec<char> = text.chars().collect();

        for (content, start) in chunker.split_text(text) {
            let len = content.chars().count();
            let slice: String = chars[start..start + len].iter().collect();
            assert_eq!(slice, content);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let chunker = TextChunker::new(12, 2).unwrap();
        let pieces = chunker.split_text("para one.\n\npara two.");

        assert_eq!(pieces, vec![("para one.", 0), ("para two.", 11)]);
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let chunker = TextChunker::new(4, 1).unwrap();
        let pieces = chunker.split_text("abcdefghij");

        assert_eq!(pieces, vec![("abcd", 0), ("defg", 3), ("ghij", 6)]);
    }

    #[test]
    fn test_multibyte_offsets_are_in_chars() {
        let chunker = TextChunker::new(8, 0).unwrap();
        let pieces = chunker.split_text("héllo wörld ünïcode");

        for (content, _) in &pieces {
            assert!(content.chars().count() <= 8);
        }
        let (_, start) = pieces[1];
        assert_eq!(start, 6);
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(100, 100).is_err());
        assert!(TextChunker::new(100, 150).is_err());
    }

    #[test]
    fn test_custom_separators() {
        let chunker = TextChunker::new(6, 0).unwrap().with_separators(["|", ""]);
        let pieces = chunker.split_text("abc|def|ghi");

        assert_eq!(pieces, vec![("abc", 0), ("|def", 3), ("|ghi", 7)]);
    }
}
