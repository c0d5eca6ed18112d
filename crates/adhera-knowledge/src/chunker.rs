//! Splits normalized guideline text into overlapping passages.
//!
//! Sizes and offsets are measured in characters, never bytes, so multi-byte
//! text can never be split inside a code point.

use adhera_core::Document;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("document '{0}' is empty")]
    EmptyDocument(String),
}

/// Chunking parameters: target passage size in characters and the fraction
/// of each passage repeated at the start of the next.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub size: usize,
    pub overlap: f32,
}

impl ChunkConfig {
    pub fn new(size: usize, overlap: f32) -> Self {
        Self { size, overlap }
    }

    fn overlap_chars(&self) -> usize {
        let chars = (self.size as f32 * self.overlap) as usize;
        // Overlap must leave room for progress.
        chars.min(self.size.saturating_sub(1))
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 0.1,
        }
    }
}

/// A chunk slice before it is embedded and registered with the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Character offset of the slice within the source document.
    pub start: usize,
    pub text: String,
}

/// Split a document into passages covering its whole text.
///
/// Chunk ends prefer sentence boundaries within the second half of the
/// window; when none is found the split is hard. A document shorter than one
/// chunk yields exactly one passage. Zero-length (or all-whitespace) input is
/// an error the caller may choose to treat as skippable.
pub fn chunk(document: &Document, cfg: ChunkConfig) -> Result<ChunkIter<'_>, ChunkError> {
    if document.text.trim().is_empty() {
        return Err(ChunkError::EmptyDocument(document.source.clone()));
    }
    Ok(ChunkIter::new(&document.text, cfg))
}

/// Lazy, restartable iterator over one document's chunks.
///
/// Restartable: calling [`chunk`] again on the same document yields the same
/// sequence.
#[derive(Debug)]
pub struct ChunkIter<'a> {
    text: &'a str,
    /// Byte offset of every character boundary, plus the end of the text.
    boundaries: Vec<usize>,
    size: usize,
    overlap: usize,
    pos: usize,
    done: bool,
}

impl<'a> ChunkIter<'a> {
    fn new(text: &'a str, cfg: ChunkConfig) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self {
            text,
            boundaries,
            size: cfg.size.max(1),
            overlap: cfg.overlap_chars(),
            pos: 0,
            done: false,
        }
    }

    fn num_chars(&self) -> usize {
        self.boundaries.len() - 1
    }

    fn slice(&self, start_char: usize, end_char: usize) -> &'a str {
        &self.text[self.boundaries[start_char]..self.boundaries[end_char]]
    }

    /// Last sentence boundary in `(from, to]`, as the character index just
    /// after the terminator. `None` means a hard split.
    fn sentence_split(&self, from: usize, to: usize) -> Option<usize> {
        let window = self.slice(from, to);
        let mut best = None;
        let mut prev_terminator = false;
        for (offset, ch) in window.chars().enumerate() {
            if ch == '\n' {
                best = Some(from + offset + 1);
                prev_terminator = false;
                continue;
            }
            if prev_terminator && ch.is_whitespace() {
                best = Some(from + offset);
            }
            prev_terminator = matches!(ch, '.' | '!' | '?');
        }
        // A terminator as the very last window character also counts.
        if prev_terminator {
            best = Some(to);
        }
        best
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let start = self.pos;
        let total = self.num_chars();
        let hard_end = (start + self.size).min(total);

        let end = if hard_end >= total {
            total
        } else {
            // Only look in the second half so chunks never collapse to a
            // few characters when sentences are long.
            let floor = start + self.size / 2;
            self.sentence_split(floor, hard_end).unwrap_or(hard_end)
        };

        let chunk = Chunk {
            start,
            text: self.slice(start, end).to_string(),
        };

        if end >= total {
            self.done = true;
        } else {
            let next = end.saturating_sub(self.overlap);
            // Guarantee forward progress even with large overlaps.
            self.pos = next.max(start + 1);
        }

        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("test", text)
    }

    fn collect(text: &str, size: usize, overlap: f32) -> Vec<Chunk> {
        chunk(&doc(text), ChunkConfig::new(size, overlap))
            .unwrap()
            .collect()
    }

    #[test]
    fn empty_document_errors() {
        let err = chunk(&doc(""), ChunkConfig::default()).unwrap_err();
        assert!(matches!(err, ChunkError::EmptyDocument(_)));

        let err = chunk(&doc("   \n\t"), ChunkConfig::default()).unwrap_err();
        assert!(matches!(err, ChunkError::EmptyDocument(_)));
    }

    #[test]
    fn short_document_yields_one_chunk() {
        let chunks = collect("short guideline text", 1000, 0.1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].text, "short guideline text");
    }

    #[test]
    fn chunks_cover_the_whole_document() {
        let text = "abcdefghij".repeat(37); // 370 chars, no sentence marks
        let chunks = collect(&text, 100, 0.1);
        assert!(chunks.len() > 1);

        // First chunk starts at 0, last chunk reaches the end.
        assert_eq!(chunks[0].start, 0);
        let last = chunks.last().unwrap();
        assert_eq!(last.start + last.text.chars().count(), text.chars().count());

        // No gap between consecutive chunks.
        for pair in chunks.windows(2) {
            let end = pair[0].start + pair[0].text.chars().count();
            assert!(pair[1].start <= end, "gap between chunks");
            assert!(pair[1].start > pair[0].start, "no forward progress");
        }
    }

    #[test]
    fn overlap_fraction_is_respected() {
        let text = "x".repeat(1000);
        let chunks = collect(&text, 100, 0.2);
        for pair in chunks.windows(2) {
            let end = pair[0].start + pair[0].text.chars().count();
            let overlap = end - pair[1].start;
            assert_eq!(overlap, 20);
        }
    }

    #[test]
    fn zero_overlap_tiles_exactly() {
        let text = "y".repeat(250);
        let chunks = collect(&text, 100, 0.0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[1].start, 100);
        assert_eq!(chunks[2].start, 200);
        assert_eq!(chunks[2].text.len(), 50);
    }

    #[test]
    fn prefers_sentence_boundaries() {
        // Two sentences; the split should land after the first period, not
        // in the middle of the second sentence.
        let text = format!(
            "{} end of first. {} tail",
            "a".repeat(60),
            "b".repeat(60)
        );
        let chunks = collect(&text, 100, 0.0);
        assert!(chunks[0].text.trim_end().ends_with("end of first."));
    }

    #[test]
    fn falls_back_to_hard_split() {
        let text = "z".repeat(500);
        let chunks = collect(&text, 100, 0.0);
        assert!(chunks.iter().take(4).all(|c| c.text.chars().count() == 100));
    }

    #[test]
    fn multibyte_text_is_never_split_inside_a_char() {
        let text = "é".repeat(300);
        let chunks = collect(&text, 100, 0.1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 100);
            assert!(c.text.chars().all(|ch| ch == 'é'));
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.start + last.text.chars().count(), 300);
    }

    #[test]
    fn restartable_sequence_is_identical() {
        let text = format!("First sentence. {}", "word ".repeat(100));
        let a = collect(&text, 80, 0.15);
        let b = collect(&text, 80, 0.15);
        assert_eq!(a, b);
    }
}
