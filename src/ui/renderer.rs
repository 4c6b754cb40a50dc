//! Terminal ownership thread.
//!
//! All screen access is serialized through one command queue drained here:
//! the UI loop pushes frame snapshots, the searcher pushes progress
//! updates. The terminal is set up when the thread starts and restored on
//! `Quit` (or when the queue closes), so the UI thread can print the final
//! selection to a clean stdout.

use std::io::{self, Stderr, Write};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::crossterm::{cursor, execute};
use tracing::debug;

use super::render::{FrameSnapshot, draw};
use super::theme::Theme;

pub enum RenderCommand {
    /// Replace the current frame snapshot and redraw.
    Frame(Box<FrameSnapshot>),
    /// Update the search-progress suffix on the status line.
    Progress(Option<u8>),
    /// Clear and repaint from the last snapshot.
    Redraw,
    /// Restore the terminal and stop.
    Quit,
}

pub struct Renderer {
    pub tx: Sender<RenderCommand>,
    handle: JoinHandle<Result<()>>,
}

impl Renderer {
    /// Spawn the renderer thread over an existing command queue (the
    /// searcher holds the other sender for progress updates). The interface
    /// is drawn on stderr so that stdout stays reserved for the final
    /// selection.
    pub fn spawn(
        theme: Theme,
        mouse: bool,
        tx: Sender<RenderCommand>,
        rx: Receiver<RenderCommand>,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("sift-renderer".into())
            .spawn(move || render_loop(&rx, &theme, mouse))
            .context("failed to spawn renderer thread")?;
        Ok(Self { tx, handle })
    }

    /// Ask the thread to restore the terminal and wait for it to finish.
    pub fn shutdown(self) -> Result<()> {
        let _ = self.tx.send(RenderCommand::Quit);
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

fn render_loop(rx: &Receiver<RenderCommand>, theme: &Theme, mouse: bool) -> Result<()> {
    let mut terminal = setup_terminal(mouse)?;
    let result = pump_commands(rx, &mut terminal, theme);
    restore_terminal(mouse);
    debug!("renderer stopped");
    result
}

fn pump_commands(
    rx: &Receiver<RenderCommand>,
    terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    theme: &Theme,
) -> Result<()> {
    let mut snapshot = FrameSnapshot::default();
    let mut progress = None;
    while let Ok(command) = rx.recv() {
        match command {
            RenderCommand::Frame(fresh) => snapshot = *fresh,
            RenderCommand::Progress(pct) => progress = pct,
            RenderCommand::Redraw => terminal.clear()?,
            RenderCommand::Quit => return Ok(()),
        }
        terminal.draw(|frame| draw(frame, &snapshot, progress, theme))?;
    }
    Ok(())
}

fn setup_terminal(mouse: bool) -> Result<Terminal<CrosstermBackend<Stderr>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stderr = io::stderr();
    execute!(stderr, EnterAlternateScreen).context("failed to enter alternate screen")?;
    if mouse {
        let _ = execute!(stderr, EnableMouseCapture);
    }
    let terminal =
        Terminal::new(CrosstermBackend::new(stderr)).context("failed to initialize terminal")?;
    Ok(terminal)
}

/// Best-effort teardown; failures here must not mask the real outcome.
fn restore_terminal(mouse: bool) {
    let mut stderr = io::stderr();
    if mouse {
        let _ = execute!(stderr, DisableMouseCapture);
    }
    let _ = execute!(stderr, LeaveAlternateScreen, cursor::Show);
    let _ = disable_raw_mode();
    let _ = stderr.flush();
}
