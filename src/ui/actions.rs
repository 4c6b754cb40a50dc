//! Keystroke and mouse decoding.
//!
//! Terminal events flatten into one [`KeyAction`] enum handled by a single
//! dispatcher over the UI state. The bindings are fixed.

use ratatui::crossterm::event::{
    Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};

use super::state::UiState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Insert(char),
    DeleteBack,
    DeleteUnder,
    /// Ctrl-D: delete under the cursor, or abort when the query is empty.
    DeleteOrAbort,
    CursorStart,
    CursorEnd,
    CursorLeft,
    CursorRight,
    WordBack,
    WordForward,
    KillToStart,
    KillWord,
    Paste,
    ListDown,
    ListUp,
    PageBottom,
    PageTop,
    ToggleDown,
    ToggleUp,
    Commit,
    Abort,
    Redraw,
    Click { row: u16, toggle: bool },
    ScrollDown,
    ScrollUp,
    Resize,
}

/// What the dispatcher tells the event loop to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Query text or cursor changed; publish a `key` event and redraw.
    Query,
    /// Selection or vcursor changed; redraw only.
    View,
    Commit,
    Abort,
    Redraw,
}

/// Map a terminal event to an action. Returns `None` for events with no
/// binding (releases, focus changes, unbound chords).
pub fn decode(event: &TermEvent) -> Option<KeyAction> {
    match event {
        TermEvent::Key(key) if key.kind != KeyEventKind::Release => decode_key(key),
        TermEvent::Mouse(mouse) => decode_mouse(mouse),
        TermEvent::Resize(_, _) => Some(KeyAction::Resize),
        _ => None,
    }
}

fn decode_key(key: &KeyEvent) -> Option<KeyAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        let KeyCode::Char(c) = key.code else {
            return None;
        };
        return match c.to_ascii_lowercase() {
            'a' => Some(KeyAction::CursorStart),
            'e' => Some(KeyAction::CursorEnd),
            'b' => Some(KeyAction::CursorLeft),
            'f' => Some(KeyAction::CursorRight),
            'h' => Some(KeyAction::DeleteBack),
            'd' => Some(KeyAction::DeleteOrAbort),
            'u' => Some(KeyAction::KillToStart),
            'w' => Some(KeyAction::KillWord),
            'y' => Some(KeyAction::Paste),
            'j' | 'n' => Some(KeyAction::ListDown),
            'k' | 'p' => Some(KeyAction::ListUp),
            'm' => Some(KeyAction::Commit),
            'l' => Some(KeyAction::Redraw),
            'c' | 'g' | 'q' => Some(KeyAction::Abort),
            _ => None,
        };
    }

    if key.modifiers.contains(KeyModifiers::ALT) {
        return match key.code {
            KeyCode::Char('b') => Some(KeyAction::WordBack),
            KeyCode::Char('f') => Some(KeyAction::WordForward),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char(c) => Some(KeyAction::Insert(c)),
        KeyCode::Backspace => Some(KeyAction::DeleteBack),
        KeyCode::Delete => Some(KeyAction::DeleteUnder),
        KeyCode::Enter => Some(KeyAction::Commit),
        KeyCode::Esc => Some(KeyAction::Abort),
        KeyCode::Home => Some(KeyAction::CursorStart),
        KeyCode::End => Some(KeyAction::CursorEnd),
        KeyCode::Left => Some(KeyAction::CursorLeft),
        KeyCode::Right => Some(KeyAction::CursorRight),
        KeyCode::Down => Some(KeyAction::ListDown),
        KeyCode::Up => Some(KeyAction::ListUp),
        KeyCode::PageDown => Some(KeyAction::PageBottom),
        KeyCode::PageUp => Some(KeyAction::PageTop),
        KeyCode::Tab => Some(KeyAction::ToggleDown),
        KeyCode::BackTab => Some(KeyAction::ToggleUp),
        _ => None,
    }
}

fn decode_mouse(mouse: &MouseEvent) -> Option<KeyAction> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => Some(KeyAction::Click {
            row: mouse.row,
            toggle: mouse.modifiers.contains(KeyModifiers::SHIFT),
        }),
        MouseEventKind::ScrollDown => Some(KeyAction::ScrollDown),
        MouseEventKind::ScrollUp => Some(KeyAction::ScrollUp),
        _ => None,
    }
}

/// Apply an action to the UI state. Click handling lives in the event loop
/// because it needs the screen geometry.
pub fn apply(state: &mut UiState, action: KeyAction, visible_rows: usize) -> Effect {
    match action {
        KeyAction::Insert(rune) => {
            state.insert(rune);
            Effect::Query
        }
        KeyAction::DeleteBack => query_if(state.delete_back()),
        KeyAction::DeleteUnder => query_if(state.delete_under()),
        KeyAction::DeleteOrAbort => {
            if state.query.is_empty() {
                Effect::Abort
            } else {
                query_if(state.delete_under())
            }
        }
        KeyAction::CursorStart => {
            state.cursor_start();
            Effect::Query
        }
        KeyAction::CursorEnd => {
            state.cursor_end();
            Effect::Query
        }
        KeyAction::CursorLeft => {
            state.cursor_left();
            Effect::Query
        }
        KeyAction::CursorRight => {
            state.cursor_right();
            Effect::Query
        }
        KeyAction::WordBack => {
            state.word_back();
            Effect::Query
        }
        KeyAction::WordForward => {
            state.word_forward();
            Effect::Query
        }
        KeyAction::KillToStart => query_if(state.kill_to_start()),
        KeyAction::KillWord => query_if(state.kill_word()),
        KeyAction::Paste => query_if(state.paste()),
        KeyAction::ListDown | KeyAction::ScrollDown => {
            state.list_down();
            Effect::View
        }
        KeyAction::ListUp | KeyAction::ScrollUp => {
            state.list_up(visible_rows);
            Effect::View
        }
        KeyAction::PageBottom => {
            state.vcursor = 0;
            Effect::View
        }
        KeyAction::PageTop => {
            state.vcursor = state.row_limit(visible_rows).saturating_sub(1);
            Effect::View
        }
        KeyAction::ToggleDown => {
            if state.toggle_current() {
                state.list_down();
                Effect::View
            } else {
                Effect::None
            }
        }
        KeyAction::ToggleUp => {
            if state.toggle_current() {
                state.list_up(visible_rows);
                Effect::View
            } else {
                Effect::None
            }
        }
        KeyAction::Commit => Effect::Commit,
        KeyAction::Abort => Effect::Abort,
        KeyAction::Redraw | KeyAction::Resize => Effect::Redraw,
        KeyAction::Click { .. } => Effect::None,
    }
}

fn query_if(changed: bool) -> Effect {
    if changed { Effect::Query } else { Effect::None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Match;
    use std::sync::Arc;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> TermEvent {
        TermEvent::Key(KeyEvent::new(code, modifiers))
    }

    fn ctrl(c: char) -> TermEvent {
        key(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn printable_keys_insert() {
        assert_eq!(
            decode(&key(KeyCode::Char('x'), KeyModifiers::NONE)),
            Some(KeyAction::Insert('x'))
        );
        assert_eq!(
            decode(&key(KeyCode::Char('É'), KeyModifiers::SHIFT)),
            Some(KeyAction::Insert('É'))
        );
    }

    #[test]
    fn control_chords_follow_the_fixed_bindings() {
        assert_eq!(decode(&ctrl('a')), Some(KeyAction::CursorStart));
        assert_eq!(decode(&ctrl('e')), Some(KeyAction::CursorEnd));
        assert_eq!(decode(&ctrl('n')), Some(KeyAction::ListDown));
        assert_eq!(decode(&ctrl('p')), Some(KeyAction::ListUp));
        assert_eq!(decode(&ctrl('g')), Some(KeyAction::Abort));
        assert_eq!(decode(&ctrl('l')), Some(KeyAction::Redraw));
        assert_eq!(decode(&ctrl('z')), None);
    }

    #[test]
    fn arrows_mirror_the_control_bindings() {
        assert_eq!(
            decode(&key(KeyCode::Down, KeyModifiers::NONE)),
            Some(KeyAction::ListDown)
        );
        assert_eq!(
            decode(&key(KeyCode::Left, KeyModifiers::NONE)),
            Some(KeyAction::CursorLeft)
        );
    }

    #[test]
    fn shift_click_requests_a_toggle() {
        let event = TermEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 4,
            row: 7,
            modifiers: KeyModifiers::SHIFT,
        });
        assert_eq!(
            decode(&event),
            Some(KeyAction::Click {
                row: 7,
                toggle: true
            })
        );
    }

    #[test]
    fn ctrl_d_aborts_only_on_an_empty_query() {
        let mut state = UiState::new("", false);
        assert_eq!(apply(&mut state, KeyAction::DeleteOrAbort, 10), Effect::Abort);

        let mut state = UiState::new("ab", false);
        state.cursor = 0;
        assert_eq!(apply(&mut state, KeyAction::DeleteOrAbort, 10), Effect::Query);
        assert_eq!(state.query, "b");
    }

    #[test]
    fn tab_toggles_and_moves_toward_the_bottom() {
        let mut state = UiState::new("", true);
        state.matches = Arc::new(vec![
            Match::new("a".into(), Vec::new()),
            Match::new("b".into(), Vec::new()),
        ]);
        state.vcursor = 1;
        assert_eq!(apply(&mut state, KeyAction::ToggleDown, 10), Effect::View);
        assert_eq!(state.selected.len(), 1);
        assert_eq!(state.vcursor, 0);
    }

    #[test]
    fn tab_is_inert_outside_multi_mode() {
        let mut state = UiState::new("", false);
        state.matches = Arc::new(vec![Match::new("a".into(), Vec::new())]);
        assert_eq!(apply(&mut state, KeyAction::ToggleDown, 10), Effect::None);
        assert!(state.selected.is_empty());
    }

    #[test]
    fn page_keys_jump_to_the_window_edges() {
        let mut state = UiState::new("", false);
        state.matches = Arc::new(
            (0..20)
                .map(|i| Match::new(format!("line{i}").into(), Vec::new()))
                .collect(),
        );
        assert_eq!(apply(&mut state, KeyAction::PageTop, 8), Effect::View);
        assert_eq!(state.vcursor, 7);
        assert_eq!(apply(&mut state, KeyAction::PageBottom, 8), Effect::View);
        assert_eq!(state.vcursor, 0);
    }
}
