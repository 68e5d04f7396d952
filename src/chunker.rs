//! Splitting document text into overlapping, size-bounded chunks
//!
//! Sizes are counted in characters, not bytes, so a cut never lands inside a
//! multi-byte code point.

use tracing::debug;

use crate::config::ChunkingConfig;
use crate::errors::LuminaError;
use crate::errors::Result;
use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 4000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 400;

/// Character span `[start, end)` of one chunk within the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

/// Word-boundary-aware text splitter
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(LuminaError::Config("chunk_size must be > 0".to_string()));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute chunk boundaries over `chars`
    ///
    /// Empty input has no spans.
    pub fn spans(&self, chars: &[char]) -> Vec<ChunkSpan> {
        let len = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = start.saturating_add(self.chunk_size);
            if end >= len {
                spans.push(ChunkSpan { start, end: len });
                break;
            }

            // Prefer cutting at the last space after `start` inside the window
            if let Some(offset) = chars[start + 1..end].iter().rposition(|c| *c == ' ') {
                end = start + 1 + offset;
            }

            spans.push(ChunkSpan { start, end });

            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        spans
    }

    /// Split `text` into chunk strings
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.spans(&chars)
            .into_iter()
            .map(|span| chars[span.start..span.end].iter().collect())
            .collect()
    }

    /// Split `text` into indexed chunks tagged with `source`
    pub fn chunk_document(&self, text: &str, source: &str) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = self
            .split(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                text,
                index,
                source: source.to_string(),
            })
            .collect();

        debug!(
            "Chunked {} chars from {} into {} chunks (size {}, overlap {})",
            text.chars().count(),
            source,
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );
        chunks
    }
}

/// Split with explicit parameters, see [`Chunker`]
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    Ok(Chunker::new(chunk_size, chunk_overlap)?.split(text))
}

/// Rebuild the original text from its spans by dropping each overlap
pub fn reassemble(text: &str, spans: &[ChunkSpan]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut covered = 0;
    for span in spans {
        let from = covered.max(span.start);
        out.extend(&chars[from..span.end]);
        covered = span.end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sky_text() -> String {
        "The sky is blue. ".repeat(500)
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.split("").is_empty());
        assert!(chunker.chunk_document("", "empty.txt").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("hello world", 4000, 400).unwrap();
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_text_of_exact_chunk_size_is_single_chunk() {
        let text = "a".repeat(10);
        let chunks = chunk_text(&text, 10, 2).unwrap();
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            chunk_text("abc", 0, 0),
            Err(LuminaError::Config(_))
        ));
    }

    #[test]
    fn test_cuts_on_word_boundary() {
        let chunks = chunk_text("alpha beta gamma delta", 12, 0).unwrap();
        // First window "alpha beta g" is cut back to the space before "gamma"
        assert_eq!(chunks[0], "alpha beta");
        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
        assert_eq!(chunks.concat(), "alpha beta gamma delta");
    }

    #[test]
    fn test_no_space_cuts_at_raw_boundary() {
        let text = "x".repeat(25);
        let chunks = chunk_text(&text, 10, 0).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn test_overlap_larger_than_chunk_still_progresses() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunker = Chunker::new(5, 50).unwrap();
        let chars: Vec<char> = text.chars().collect();
        let spans = chunker.spans(&chars);

        assert_eq!(spans.len(), 6);
        for pair in spans.windows(2) {
            assert!(pair[1].start > pair[0].start);
        }
        assert_eq!(reassemble(text, &spans), text);
    }

    #[test]
    fn test_overlap_equal_to_chunk_size_terminates() {
        let text = "one two three four five six seven";
        let chunks = chunk_text(text, 8, 8).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 8));
    }

    #[test]
    fn test_reassembly_reconstructs_text() {
        let text = sky_text();
        let chunker = Chunker::default();
        let chars: Vec<char> = text.chars().collect();
        let spans = chunker.spans(&chars);

        assert!(spans.len() > 1);
        assert_eq!(reassemble(&text, &spans), text);
        for span in &spans {
            assert!(span.end - span.start <= chunker.chunk_size());
        }
    }

    #[test]
    fn test_chunks_overlap_by_configured_amount() {
        let text = "x".repeat(100);
        let chunker = Chunker::new(40, 10).unwrap();
        let chars: Vec<char> = text.chars().collect();
        let spans = chunker.spans(&chars);

        assert_eq!(spans[0], ChunkSpan { start: 0, end: 40 });
        assert_eq!(spans[1], ChunkSpan { start: 30, end: 70 });
        assert_eq!(spans[2], ChunkSpan { start: 60, end: 100 });
    }

    #[test]
    fn test_sky_chunk_count() {
        let text = sky_text();
        let chunks = chunk_text(&text, 4000, 400).unwrap();
        // 8500 chars, roughly 3600 fresh chars per chunk
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4000));
    }

    #[test]
    fn test_deterministic() {
        let text = sky_text();
        let first = chunk_text(&text, 700, 70).unwrap();
        let second = chunk_text(&text, 700, 70).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let text = "héllo wörld ünïcode ".repeat(20);
        let chunks = chunk_text(&text, 15, 3).unwrap();
        assert!(chunks.iter().all(|c| c.chars().count() <= 15));

        let chunker = Chunker::new(15, 3).unwrap();
        let chars: Vec<char> = text.chars().collect();
        assert_eq!(reassemble(&text, &chunker.spans(&chars)), text);
    }

    #[test]
    fn test_chunk_document_indexes_in_order() {
        let chunker = Chunker::new(10, 0).unwrap();
        let chunks = chunker.chunk_document("aaaa bbbb cccc dddd", "notes.txt");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.source, "notes.txt");
        }
    }

    #[test]
    fn test_huge_chunk_size_does_not_overflow() {
        let chunks = chunk_text("hello world", usize::MAX, 0).unwrap();
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }
}
