//! Maps speech boundary offsets onto words of the spoken text.
//!
//! Offsets are counted in `char`s. Cursor offsets are computed as if every run
//! of whitespace were a single separator; the real position of each word in
//! the source text is kept alongside for rendering.

use serde::Serialize;
use tracing::trace;

/// Position of the word currently being spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct WordCursor {
    pub word_index: usize,
    pub char_start: usize,
    pub char_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WordSpan {
    start: usize,
    len: usize,
    source_start: usize,
}

/// Word table for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordTracker {
    words: Vec<WordSpan>,
}

impl WordTracker {
    pub fn new(text: &str) -> Self {
        let mut words = Vec::new();
        let mut char_count = 0usize;
        let mut current: Option<(usize, usize)> = None;
        let mut push = |source_start: usize, len: usize| {
            words.push(WordSpan {
                start: char_count,
                len,
                source_start,
            });
            char_count += len + 1;
        };

        for (pos, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                if let Some((source_start, len)) = current.take() {
                    push(source_start, len);
                }
            } else {
                match current.as_mut() {
                    Some((_, len)) => *len += 1,
                    None => current = Some((pos, 1)),
                }
            }
        }
        if let Some((source_start, len)) = current {
            push(source_start, len);
        }
        Self { words }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// First word whose end reaches `offset`, or `None` when the offset lies
    /// past the last word.
    pub fn locate(&self, offset: usize) -> Option<WordCursor> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, span)| span.start + span.len >= offset)
            .map(|(word_index, span)| WordCursor {
                word_index,
                char_start: span.start,
                char_end: span.start + span.len,
            })
    }

    /// Char range of a word inside the original text, whitespace untouched.
    pub fn source_span(&self, word_index: usize) -> Option<(usize, usize)> {
        self.words
            .get(word_index)
            .map(|span| (span.source_start, span.source_start + span.len))
    }

    /// Boundary events are hints: an offset that matches no word keeps the
    /// previous cursor.
    pub fn advance(&self, previous: Option<WordCursor>, offset: usize) -> Option<WordCursor> {
        match self.locate(offset) {
            Some(cursor) => Some(cursor),
            None => {
                trace!(offset, words = self.words.len(), "Boundary offset past text end");
                previous
            }
        }
    }
}
