//! Core data model shared across the reader, searcher, and UI threads.

use std::sync::Arc;

/// A single candidate read from the input stream, trailing newline stripped.
///
/// Lines are immutable after publication and shared by reference between the
/// batch list, the match cache, and the selection set.
pub type Line = Arc<str>;

/// Half-open byte interval `[begin, end)` into a candidate line marking a
/// highlighted match region.
pub type Offset = (usize, usize);

/// An ordered group of lines appended together by the reader. Batches are
/// never mutated once the searcher has picked them up.
pub type Batch = Vec<Line>;

/// A candidate line together with the byte offsets contributed by the
/// matcher. Offsets are sorted by `begin`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub line: Line,
    pub offsets: Vec<Offset>,
}

impl Match {
    pub fn new(line: Line, mut offsets: Vec<Offset>) -> Self {
        offsets.sort_unstable();
        Self { line, offsets }
    }

    /// Length of the union of this match's offsets, collapsing overlaps.
    pub fn span_len(&self) -> usize {
        let mut total = 0;
        let mut cursor = 0;
        for &(begin, end) in &self.offsets {
            let begin = begin.max(cursor);
            if end > begin {
                total += end - begin;
            }
            cursor = cursor.max(end);
        }
        total
    }
}

/// The ordered result list published by the searcher.
pub type MatchList = Vec<Match>;

/// Query text and cursor position as owned by the UI loop and delivered to
/// the searcher inside a `key` event. `cursor_x` counts characters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuerySnapshot {
    pub text: String,
    pub cursor_x: usize,
}

impl QuerySnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor_x = text.chars().count();
        Self { text, cursor_x }
    }

    /// Query text before the cursor.
    pub fn prefix(&self) -> &str {
        &self.text[..self.byte_cursor()]
    }

    /// Query text at and after the cursor.
    pub fn suffix(&self) -> &str {
        &self.text[self.byte_cursor()..]
    }

    fn byte_cursor(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor_x)
            .map_or(self.text.len(), |(idx, _)| idx)
    }
}
