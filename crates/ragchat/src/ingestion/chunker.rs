//! Text chunking with overlap and natural-boundary preference

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Text chunker with configurable size and overlap.
///
/// Produces a windowed scan over the document text: each chunk is at most
/// `chunk_size` bytes, and each chunk after the first starts `overlap` bytes
/// before the previous chunk's end so retrieval keeps cross-boundary context.
/// Cuts prefer a paragraph break, then a sentence boundary, then whitespace,
/// and only then fall back to a hard cut at the size limit.
pub struct TextChunker {
    /// Maximum chunk size in bytes
    chunk_size: usize,
    /// Overlap between consecutive chunks in bytes
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker. `overlap < chunk_size` is enforced by
    /// [`crate::config::RagConfig::validate`].
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap }
    }

    /// Split a document into ordered, overlapping chunks.
    ///
    /// Guarantees: `chunk_index` strictly increasing from 0, no empty chunks,
    /// and full coverage of the text (the overlap is the only duplication;
    /// `char_start`/`char_end` offsets tile the document).
    pub fn split(&self, document: &Document) -> Result<Vec<Chunk>> {
        let text = &document.text;
        if text.trim().is_empty() {
            return Err(Error::ingestion(format!(
                "document '{}' has no readable text",
                document.name
            )));
        }

        let len = text.len();
        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0u32;

        loop {
            let mut limit = floor_char_boundary(text, (start + self.chunk_size).min(len));
            if limit <= start {
                // A single multi-byte character is wider than the remaining
                // window; widen past the limit rather than emit nothing.
                limit = ceil_char_boundary(text, start + 1);
            }

            let end = if limit >= len {
                len
            } else {
                self.break_point(text, start, limit)
            };

            chunks.push(Chunk::new(
                document,
                text[start..end].to_string(),
                index,
                start,
                end,
            ));
            index += 1;

            if end >= len {
                break;
            }

            // Snapping forward keeps the realized overlap within the
            // configured maximum.
            let mut next = ceil_char_boundary(text, end.saturating_sub(self.overlap));
            if next <= start {
                next = end;
            }
            start = next;
        }

        tracing::debug!(
            document = %document.name,
            chunks = chunks.len(),
            "document chunked"
        );
        Ok(chunks)
    }

    /// Find the best cut position in `text[start..limit]`.
    ///
    /// A natural boundary is only taken if it keeps at least half the window,
    /// so boundary-dense text does not collapse into tiny chunks.
    fn break_point(&self, text: &str, start: usize, limit: usize) -> usize {
        let window = &text[start..limit];
        let min_cut = window.len() / 2;

        // Paragraph break, cut after the blank line
        if let Some(pos) = window.rfind("\n\n") {
            let cut = pos + 2;
            if cut > min_cut {
                return start + cut;
            }
        }

        // End of the last complete sentence in the window: the final segment
        // reported by the segmenter is the sentence the limit cut through, so
        // its start offset is the boundary we want.
        let mut cut = 0;
        for (offset, _) in window.split_sentence_bound_indices() {
            if offset > 0 {
                cut = offset;
            }
        }
        if cut > min_cut {
            return start + cut;
        }

        // Whitespace, cut after it
        if let Some(pos) = window.rfind(char::is_whitespace) {
            let cut = pos + window[pos..].chars().next().map_or(1, |c| c.len_utf8());
            if cut > min_cut {
                return start + cut;
            }
        }

        // Hard cut at the size limit
        limit
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Snap a byte index forward to the nearest valid UTF-8 char boundary.
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
