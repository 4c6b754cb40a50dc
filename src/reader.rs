//! Input acquisition thread.
//!
//! Reads newline-delimited candidates from stdin, from a user-configured
//! default command, or from a built-in file walk when stdin is attached to
//! the terminal. Lines are appended to a pending buffer shared with the
//! searcher; each append posts a coalesced `new` event, and end of input
//! posts `loaded` exactly once.

use std::io::{self, BufRead, BufReader, IsTerminal, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::debug;

use crate::events::{Event, EventBus};
use crate::types::Line;

/// Environment variable naming the command used when stdin is a TTY.
pub const DEFAULT_COMMAND_ENV: &str = "SIFT_DEFAULT_COMMAND";

/// Lines appended by the reader and not yet picked up by the searcher.
#[derive(Default)]
pub struct PendingLines {
    lines: Mutex<Vec<Line>>,
}

impl PendingLines {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, line: Line) {
        self.lines.lock().expect("pending buffer poisoned").push(line);
    }

    /// Move the accumulated lines out, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Line> {
        std::mem::take(&mut *self.lines.lock().expect("pending buffer poisoned"))
    }
}

/// Where candidates come from. Resolved before any screen setup so that a
/// missing source can abort with a plain error.
pub enum Source {
    Stream(Box<dyn Read + Send>),
    Command(Child),
    Walk(PathBuf),
}

/// Pick the candidate source: piped stdin when available, otherwise the
/// default command from the environment, otherwise the built-in walker.
pub fn resolve_source(default_command: Option<&str>) -> Result<Source> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Ok(Source::Stream(Box::new(stdin)));
    }
    match default_command {
        Some(command) if !command.trim().is_empty() => {
            let child = Command::new("sh")
                .arg("-c")
                .arg(command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("failed to run default command: {command}"))?;
            Ok(Source::Command(child))
        }
        _ => Ok(Source::Walk(PathBuf::from("."))),
    }
}

/// Start the reader thread for `source`.
pub fn spawn(
    source: Source,
    pending: Arc<PendingLines>,
    bus: Arc<EventBus>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("sift-reader".into())
        .spawn(move || {
            let outcome = match source {
                Source::Stream(stream) => read_stream(stream, &pending, &bus),
                Source::Command(mut child) => {
                    let stdout = child.stdout.take();
                    let outcome = match stdout {
                        Some(stdout) => read_stream(Box::new(stdout), &pending, &bus),
                        None => Ok(()),
                    };
                    let _ = child.wait();
                    outcome
                }
                Source::Walk(root) => walk_files(&root, &pending, &bus),
            };
            if let Err(err) = outcome {
                bus.emit(Event::WorkerFailed(format!("reader: {err:#}")));
            }
            debug!("input drained");
            bus.emit(Event::Loaded);
        })
        .expect("failed to spawn reader thread")
}

fn read_stream(
    stream: Box<dyn Read + Send>,
    pending: &PendingLines,
    bus: &EventBus,
) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        let read = reader.read_until(b'\n', &mut buffer)?;
        if read == 0 {
            return Ok(());
        }
        if buffer.last() == Some(&b'\n') {
            buffer.pop();
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
        }
        // Lines that are not valid UTF-8 stay in the corpus in lossy form;
        // they simply fail to match queries containing the damaged runes.
        let line: Line = String::from_utf8_lossy(&buffer).into_owned().into();
        pending.push(line);
        bus.emit(Event::NewLines);
    }
}

/// Built-in fallback enumeration: plain files and symlinks under `root`,
/// hidden paths pruned, no ignore-file filtering.
fn walk_files(root: &std::path::Path, pending: &PendingLines, bus: &EventBus) -> Result<()> {
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(%err, "skipping unreadable path");
                continue;
            }
        };
        let keep = entry
            .file_type()
            .map(|kind| kind.is_file() || kind.is_symlink())
            .unwrap_or(false);
        if !keep {
            continue;
        }
        let path = entry.path();
        let display = path.strip_prefix(root).unwrap_or(path);
        pending.push(display.to_string_lossy().into_owned().into());
        bus.emit(Event::NewLines);
    }
    Ok(())
}
