//! Non-interactive entry points: filter mode and the select-1 / exit-0
//! pre-screen decision, all of which run before any terminal setup.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::cache::MatchCache;
use crate::events::{Event, EventBus, EventKind};
use crate::matcher::Matcher;
use crate::reader::{self, PendingLines, Source};
use crate::searcher::{SearchConfig, SearchShared, run_pass};
use crate::types::{MatchList, QuerySnapshot};

/// Drain `source` to completion and run one matcher pass for `query`,
/// returning the ranked matches.
pub fn run_filter(
    source: Source,
    mut matcher: Matcher,
    config: SearchConfig,
    query: &str,
) -> Result<Arc<MatchList>> {
    let bus = EventBus::new();
    let pending = PendingLines::new();
    let handle = reader::spawn(source, Arc::clone(&pending), Arc::clone(&bus));

    let mut failure = None;
    loop {
        let events = bus.take();
        for event in events.values() {
            if let Event::WorkerFailed(message) = event {
                failure = Some(message.clone());
            }
        }
        if events.contains_key(&EventKind::Loaded) {
            break;
        }
    }
    let _ = handle.join();
    if let Some(message) = failure {
        return Err(anyhow!(message));
    }

    let batches = vec![pending.drain()];
    let shared = SearchShared::new();
    let mut cache = MatchCache::new();
    let token = bus.cancel_token();
    run_pass(
        &mut matcher,
        config,
        &shared,
        &mut cache,
        &batches,
        &QuerySnapshot::new(query),
        &token,
        None,
    );
    Ok(shared.matches())
}

/// Block until the searcher has covered the fully loaded corpus: `loaded`
/// is set and the latest publish accounts for every line read.
pub fn wait_until_settled(shared: &SearchShared) -> Result<()> {
    use std::sync::atomic::Ordering;
    loop {
        if let Some(message) = shared.take_failure() {
            return Err(anyhow!(message));
        }
        let loaded = shared.loaded.load(Ordering::Acquire);
        let count = shared.count.load(Ordering::Acquire);
        let searched = shared.searched_count.load(Ordering::Acquire);
        if loaded && searched == count && shared.version.load(Ordering::Acquire) > 0 {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// What the pre-screen check decided once the corpus settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prescreen {
    /// Exactly one match with `--select-1`: print it without a screen.
    PickSole,
    /// Zero matches with `--exit-0`: succeed silently without a screen.
    ExitEmpty,
    /// Fall through to the interactive interface.
    Interactive,
}

pub fn decide(match_count: usize, select_1: bool, exit_0: bool) -> Prescreen {
    if select_1 && match_count == 1 {
        Prescreen::PickSole
    } else if exit_0 && match_count == 0 {
        Prescreen::ExitEmpty
    } else {
        Prescreen::Interactive
    }
}
