//! Interactive event loop.
//!
//! Owns the query and view state, reads terminal events, forwards query
//! changes to the searcher over the bus, and keeps the renderer fed with
//! frame snapshots. Exit always restores the terminal before the outcome
//! reaches the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use ratatui::crossterm::event;
use tracing::debug;

use crate::events::{Event, EventBus};
use crate::searcher::SearchShared;
use crate::types::Line;

use super::actions::{Effect, KeyAction, apply, decode};
use super::render::FrameSnapshot;
use super::renderer::{RenderCommand, Renderer};
use super::state::UiState;
use super::theme::Theme;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DOUBLE_CLICK: Duration = Duration::from_millis(500);

pub struct UiOptions {
    pub initial_query: String,
    pub multi: bool,
    pub mouse: bool,
    pub theme: Theme,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The user confirmed a selection; emit these lines on stdout.
    Commit(Vec<Line>),
    Abort,
}

pub fn run(
    options: UiOptions,
    shared: &Arc<SearchShared>,
    bus: &Arc<EventBus>,
    render_tx: std::sync::mpsc::Sender<RenderCommand>,
    render_rx: std::sync::mpsc::Receiver<RenderCommand>,
) -> Result<Outcome> {
    let renderer = Renderer::spawn(options.theme, options.mouse, render_tx, render_rx)?;
    let mut state = UiState::new(&options.initial_query, options.multi);
    bus.emit(Event::Key(state.snapshot()));

    let result = event_loop(&mut state, shared, bus, &renderer);

    bus.emit(Event::Shutdown);
    let restore = renderer.shutdown();
    // A failed teardown only matters when the session itself succeeded.
    match result {
        Ok(outcome) => restore.map(|()| outcome),
        Err(err) => Err(err),
    }
}

fn event_loop(
    state: &mut UiState,
    shared: &Arc<SearchShared>,
    bus: &Arc<EventBus>,
    renderer: &Renderer,
) -> Result<Outcome> {
    let mut drawn = StatusProbe::default();
    let mut dirty = true;

    loop {
        if let Some(message) = shared.take_failure() {
            return Err(anyhow!(message));
        }

        let version = shared.version.load(std::sync::atomic::Ordering::Acquire);
        if version != state.seen_version {
            state.seen_version = version;
            state.matches = shared.matches();
            state.clamp_vcursor(visible_rows());
            dirty = true;
        }
        if drawn.refresh(shared) {
            dirty = true;
        }

        if dirty {
            let _ = renderer
                .tx
                .send(RenderCommand::Frame(Box::new(snapshot_frame(state, &drawn))));
            dirty = false;
        }

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Some(action) = decode(&event::read()?) else {
            continue;
        };

        let effect = match action {
            KeyAction::Click { row, toggle } => handle_click(state, row, toggle),
            other => apply(state, other, visible_rows()),
        };
        match effect {
            Effect::Query => {
                state.clamp_vcursor(visible_rows());
                bus.emit(Event::Key(state.snapshot()));
                dirty = true;
            }
            Effect::View => dirty = true,
            Effect::Redraw => {
                let _ = renderer.tx.send(RenderCommand::Redraw);
                dirty = true;
            }
            Effect::Commit => {
                debug!("commit");
                return Ok(Outcome::Commit(state.commit_lines()));
            }
            Effect::Abort => return Ok(Outcome::Abort),
            Effect::None => {}
        }
    }
}

/// Candidate rows available on screen: everything above the status and
/// prompt lines.
fn visible_rows() -> usize {
    event_size().1.saturating_sub(2) as usize
}

fn event_size() -> (u16, u16) {
    ratatui::crossterm::terminal::size().unwrap_or((80, 24))
}

/// Map a click row to a list row: the list is drawn bottom-up directly
/// above the status line. A repeated click on the selected row within half
/// a second commits.
fn handle_click(state: &mut UiState, row: u16, toggle: bool) -> Effect {
    let list_height = visible_rows();
    let row = row as usize;
    if row >= list_height {
        return Effect::None;
    }
    let index = list_height - 1 - row;
    if index >= state.row_limit(list_height) {
        return Effect::None;
    }

    let again = state
        .last_click
        .take()
        .is_some_and(|(last, at)| last == index && at.elapsed() < DOUBLE_CLICK);
    if again && !toggle {
        return Effect::Commit;
    }
    state.last_click = Some((index, Instant::now()));
    state.vcursor = index;
    if toggle {
        state.toggle_current();
    }
    Effect::View
}

fn snapshot_frame(state: &UiState, drawn: &StatusProbe) -> FrameSnapshot {
    FrameSnapshot {
        query: state.query.clone(),
        cursor: state.cursor,
        matches: Arc::clone(&state.matches),
        vcursor: state.vcursor,
        selected: state.selected.clone(),
        multi: state.multi,
        count: drawn.count,
        loaded: drawn.loaded,
        spinner: drawn.spinner,
    }
}

/// Tracks the scalar cells whose changes require a redraw.
#[derive(Default)]
struct StatusProbe {
    count: usize,
    spinner: usize,
    loaded: bool,
}

impl StatusProbe {
    fn refresh(&mut self, shared: &SearchShared) -> bool {
        use std::sync::atomic::Ordering;
        let fresh = Self {
            count: shared.count.load(Ordering::Acquire),
            spinner: shared.spinner.load(Ordering::Acquire),
            loaded: shared.loaded.load(Ordering::Acquire),
        };
        let changed = fresh.count != self.count
            || fresh.spinner != self.spinner
            || fresh.loaded != self.loaded;
        *self = fresh;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Match;

    fn state_with(lines: &[&str]) -> UiState {
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
    fn click_selects_the_row_under_the_pointer() {
        let mut state = state_with(&["a", "b", "c"]);
        let rows = visible_rows();
        // Clicking the bottom list row targets match zero.
        let effect = handle_click(&mut state, (rows - 1) as u16, false);
        assert_eq!(effect, Effect::View);
        assert_eq!(state.vcursor, 0);
    }

    #[test]
    fn second_click_on_the_same_row_commits() {
        let mut state = state_with(&["a", "b", "c"]);
        let rows = visible_rows();
        let row = (rows - 1) as u16;
        assert_eq!(handle_click(&mut state, row, false), Effect::View);
        assert_eq!(handle_click(&mut state, row, false), Effect::Commit);
    }

    #[test]
    fn stale_click_does_not_commit() {
        let mut state = state_with(&["a", "b"]);
        let rows = visible_rows();
        let row = (rows - 1) as u16;
        assert_eq!(handle_click(&mut state, row, false), Effect::View);
        state.last_click = Some((0, Instant::now() - Duration::from_secs(2)));
        assert_eq!(handle_click(&mut state, row, false), Effect::View);
    }

    #[test]
    fn shift_click_toggles_instead_of_committing() {
        let mut state = state_with(&["a", "b"]);
        let rows = visible_rows();
        let row = (rows - 1) as u16;
        assert_eq!(handle_click(&mut state, row, true), Effect::View);
        assert_eq!(state.selected.len(), 1);
        assert_eq!(handle_click(&mut state, row, true), Effect::View);
        assert!(state.selected.is_empty());
    }

    #[test]
    fn clicks_outside_the_list_are_ignored() {
        let mut state = state_with(&["a"]);
        let rows = visible_rows() as u16;
        assert_eq!(handle_click(&mut state, rows, false), Effect::None);
        assert_eq!(handle_click(&mut state, rows + 1, false), Effect::None);
    }
}
