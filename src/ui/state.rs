//! Query, cursor, and selection state owned by the UI loop.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexSet;

use crate::types::{Line, MatchList, QuerySnapshot};

pub struct UiState {
    pub query: String,
    /// Cursor position in character units, `0 ≤ cursor ≤ chars(query)`.
    pub cursor: usize,
    /// Kill buffer for Ctrl-U / Ctrl-W, reinserted by Ctrl-Y.
    pub yank: String,
    /// Index of the highlighted row in the match list; row zero is the
    /// best match, drawn at the bottom of the list.
    pub vcursor: usize,
    /// Multi-selected lines in the order they were toggled on.
    pub selected: IndexSet<Line>,
    pub multi: bool,
    pub matches: Arc<MatchList>,
    pub seen_version: u64,
    pub last_click: Option<(usize, Instant)>,
}

impl UiState {
    pub fn new(initial_query: &str, multi: bool) -> Self {
        Self {
            query: initial_query.to_string(),
            cursor: initial_query.chars().count(),
            yank: String::new(),
            vcursor: 0,
            selected: IndexSet::new(),
            multi,
            matches: Arc::new(Vec::new()),
            seen_version: 0,
            last_click: None,
        }
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            text: self.query.clone(),
            cursor_x: self.cursor,
        }
    }

    fn byte_at(&self, char_idx: usize) -> usize {
        self.query
            .char_indices()
            .nth(char_idx)
            .map_or(self.query.len(), |(idx, _)| idx)
    }

    pub fn insert(&mut self, rune: char) {
        let at = self.byte_at(self.cursor);
        self.query.insert(at, rune);
        self.cursor += 1;
    }

    pub fn delete_back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let start = self.byte_at(self.cursor - 1);
        let end = self.byte_at(self.cursor);
        self.query.replace_range(start..end, "");
        self.cursor -= 1;
        true
    }

    pub fn delete_under(&mut self) -> bool {
        if self.cursor >= self.query.chars().count() {
            return false;
        }
        let start = self.byte_at(self.cursor);
        let end = self.byte_at(self.cursor + 1);
        self.query.replace_range(start..end, "");
        true
    }

    pub fn cursor_start(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.query.chars().count();
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.query.chars().count());
    }

    /// Move to the start of the previous whitespace-delimited word.
    pub fn word_back(&mut self) {
        let chars: Vec<char> = self.query.chars().collect();
        let mut pos = self.cursor;
        while pos > 0 && chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        while pos > 0 && !chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        self.cursor = pos;
    }

    /// Move to the end of the next word.
    pub fn word_forward(&mut self) {
        let chars: Vec<char> = self.query.chars().collect();
        let mut pos = self.cursor;
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        while pos < chars.len() && !chars[pos].is_whitespace() {
            pos += 1;
        }
        self.cursor = pos;
    }

    /// Delete from the start of the query to the cursor into the yank
    /// buffer.
    pub fn kill_to_start(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let end = self.byte_at(self.cursor);
        self.yank = self.query[..end].to_string();
        self.query.replace_range(..end, "");
        self.cursor = 0;
        true
    }

    /// Delete the word before the cursor into the yank buffer.
    pub fn kill_word(&mut self) -> bool {
        let from = self.cursor;
        self.word_back();
        let to = self.cursor;
        if from == to {
            return false;
        }
        let start = self.byte_at(to);
        let end = self.byte_at(from);
        self.yank = self.query[start..end].to_string();
        self.query.replace_range(start..end, "");
        true
    }

    /// Insert the yank buffer at the cursor.
    pub fn paste(&mut self) -> bool {
        if self.yank.is_empty() {
            return false;
        }
        let at = self.byte_at(self.cursor);
        let pasted = self.yank.clone();
        self.query.insert_str(at, &pasted);
        self.cursor += pasted.chars().count();
        true
    }

    /// Rows the vcursor may occupy given the viewport height.
    pub fn row_limit(&self, visible_rows: usize) -> usize {
        self.matches.len().min(visible_rows)
    }

    pub fn clamp_vcursor(&mut self, visible_rows: usize) {
        let limit = self.row_limit(visible_rows);
        self.vcursor = self.vcursor.min(limit.saturating_sub(1));
    }

    /// Toward the bottom of the list in screen order.
    pub fn list_down(&mut self) {
        self.vcursor = self.vcursor.saturating_sub(1);
    }

    pub fn list_up(&mut self, visible_rows: usize) {
        let limit = self.row_limit(visible_rows);
        self.vcursor = (self.vcursor + 1).min(limit.saturating_sub(1));
    }

    pub fn current_line(&self) -> Option<Line> {
        self.matches
            .get(self.vcursor)
            .map(|entry| Arc::clone(&entry.line))
    }

    /// Toggle the line under the vcursor in the multi-select set.
    pub fn toggle_current(&mut self) -> bool {
        if !self.multi {
            return false;
        }
        let Some(line) = self.current_line() else {
            return false;
        };
        if !self.selected.insert(Arc::clone(&line)) {
            self.selected.shift_remove(&line);
        }
        true
    }

    /// The lines a commit emits: the multi-selection in toggle order when
    /// populated, otherwise the line under the vcursor.
    pub fn commit_lines(&self) -> Vec<Line> {
        if self.multi && !self.selected.is_empty() {
            self.selected.iter().map(Arc::clone).collect()
        } else {
            self.current_line().into_iter().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Match;

    fn with_matches(lines: &[&str]) -> UiState {
        let mut state = UiState::new("", true);
        state.matches = Arc::new(
            lines
                .iter()
                .map(|line| Match::new((*line).into(), Vec::new()))
                .collect(),
        );
        state
    }

    #[test]
    fn insert_and_delete_track_char_cursor() {
        let mut state = UiState::new("", false);
        for rune in "héllo".chars() {
            state.insert(rune);
        }
        assert_eq!(state.query, "héllo");
        assert_eq!(state.cursor, 5);

        state.cursor = 2;
        assert!(state.delete_back());
        assert_eq!(state.query, "hllo");
        assert_eq!(state.cursor, 1);

        assert!(state.delete_under());
        assert_eq!(state.query, "hlo");
    }

    #[test]
    fn word_motions_are_whitespace_delimited() {
        let mut state = UiState::new("foo  bar baz", false);
        state.word_back();
        assert_eq!(state.cursor, 9);
        state.word_back();
        assert_eq!(state.cursor, 5);
        state.cursor_start();
        state.word_forward();
        assert_eq!(state.cursor, 3);
        state.word_forward();
        assert_eq!(state.cursor, 8);
    }

    #[test]
    fn kill_and_paste_round_trip_through_the_yank_buffer() {
        let mut state = UiState::new("alpha beta", false);
        assert!(state.kill_word());
        assert_eq!(state.query, "alpha ");
        assert_eq!(state.yank, "beta");

        assert!(state.paste());
        assert_eq!(state.query, "alpha beta");

        state.cursor = 5;
        assert!(state.kill_to_start());
        assert_eq!(state.query, " beta");
        assert_eq!(state.yank, "alpha");
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn vcursor_stays_inside_the_visible_window() {
        let mut state = with_matches(&["a", "b", "c", "d"]);
        state.list_up(3);
        state.list_up(3);
        state.list_up(3);
        assert_eq!(state.vcursor, 2);
        state.list_down();
        assert_eq!(state.vcursor, 1);

        state.matches = Arc::new(Vec::new());
        state.clamp_vcursor(3);
        assert_eq!(state.vcursor, 0);
    }

    #[test]
    fn toggling_twice_leaves_selection_unchanged() {
        let mut state = with_matches(&["a", "b"]);
        assert!(state.toggle_current());
        assert!(state.toggle_current());
        assert!(state.selected.is_empty());
    }

    #[test]
    fn commit_preserves_toggle_order() {
        let mut state = with_matches(&["A", "B", "C"]);
        state.vcursor = 0;
        state.toggle_current();
        state.vcursor = 2;
        state.toggle_current();
        state.vcursor = 1;
        state.toggle_current();

        let picked: Vec<String> = state
            .commit_lines()
            .iter()
            .map(|line| line.to_string())
            .collect();
        assert_eq!(picked, vec!["A", "C", "B"]);
    }

    #[test]
    fn commit_without_selection_uses_the_vcursor_row() {
        let mut state = with_matches(&["first", "second"]);
        state.vcursor = 1;
        let picked = state.commit_lines();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].as_ref(), "second");
    }
}
