//! Deterministic sliding-window chunker
//!
//! Offsets are measured in characters, not bytes, so spans are stable across
//! encodings of the same text. The iterator is lazy and restartable:
//! re-deriving chunks from the same text and parameters yields identical
//! boundaries, which idempotent re-ingestion depends on.

use crate::error::{CortexError, Result};
use serde::{Deserialize, Serialize};

/// A contiguous slice of a document's text: `[start, end)` in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    /// Zero-based sequence index within the document
    pub index: usize,
    /// Start offset in characters (inclusive)
    pub start: usize,
    /// End offset in characters (exclusive)
    pub end: usize,
}

/// Lazy iterator over the chunk spans of a text
pub struct ChunkIter<'a> {
    text: &'a str,
    /// Byte offset of each char boundary; `offsets[char_count]` == text.len()
    offsets: Vec<usize>,
    window: usize,
    stride: usize,
    next_start: usize,
    index: usize,
    done: bool,
}

/// Split text into overlapping fixed-size windows.
///
/// Spans advance by `window - overlap`; the final span may be shorter than
/// `window`. Text shorter than the window yields exactly one span covering
/// it. `overlap >= window` or a zero window fails fast with
/// `InvalidChunkConfig`.
pub fn split(text: &str, window: usize, overlap: usize) -> Result<ChunkIter<'_>> {
    if window == 0 || overlap >= window {
        return Err(CortexError::InvalidChunkConfig { window, overlap });
    }

    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());

    Ok(ChunkIter {
        text,
        offsets,
        window,
        stride: window - overlap,
        next_start: 0,
        index: 0,
        done: text.is_empty(),
    })
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = (ChunkSpan, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let char_count = self.offsets.len() - 1;
        let start = self.next_start;
        let end = (start + self.window).min(char_count);

        let span = ChunkSpan {
            index: self.index,
            start,
            end,
        };
        let slice = &self.text[self.offsets[start]..self.offsets[end]];

        // The span that reaches the end of text is the last one; anything
        // after it would be fully contained in this span.
        if end == char_count {
            self.done = true;
        } else {
            self.next_start = start + self.stride;
            self.index += 1;
        }

        Some((span, slice))
    }
}
