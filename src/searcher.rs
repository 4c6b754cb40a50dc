//! Background search worker.
//!
//! Single consumer of the event bus. On `new` events it adopts the reader's
//! pending lines as an immutable batch, on `key` events it adopts the fresh
//! query snapshot, and whenever either fired it re-runs the matcher over
//! the accumulated batches. Keystrokes pre-empt an in-flight pass through
//! the cancellation token; reader-driven passes back off exponentially so a
//! fast producer cannot saturate the thread.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::MatchCache;
use crate::events::{CancelToken, Event, EventBus};
use crate::matcher::Matcher;
use crate::types::{Batch, Line, Match, MatchList, QuerySnapshot};
use crate::ui::renderer::RenderCommand;

/// Lines scanned between cancellation checks inside a batch.
const CANCEL_CHECK_INTERVAL: usize = 1024;
/// A pass slower than this starts reporting progress percentages.
const PROGRESS_AFTER: Duration = Duration::from_millis(500);
/// Backoff bounds for reader-driven search cycles.
const BACKOFF_START: Duration = Duration::from_millis(5);
const BACKOFF_CAP: Duration = Duration::from_millis(200);

#[derive(Clone, Copy, Debug)]
pub struct SearchConfig {
    /// Rank results when the match count stays within `sort_limit`.
    pub sort: bool,
    pub sort_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            sort: true,
            sort_limit: 1000,
        }
    }
}

/// State cells shared between the searcher and the UI threads. The match
/// list is an immutable snapshot swapped atomically under a mutex; scalar
/// cells are plain atomics.
pub struct SearchShared {
    matches: Mutex<Arc<MatchList>>,
    pub version: AtomicU64,
    pub count: AtomicUsize,
    pub searched_count: AtomicUsize,
    pub spinner: AtomicUsize,
    pub loaded: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl SearchShared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            matches: Mutex::new(Arc::new(Vec::new())),
            version: AtomicU64::new(0),
            count: AtomicUsize::new(0),
            searched_count: AtomicUsize::new(0),
            spinner: AtomicUsize::new(0),
            loaded: AtomicBool::new(false),
            failure: Mutex::new(None),
        })
    }

    pub fn matches(&self) -> Arc<MatchList> {
        Arc::clone(&self.matches.lock().expect("match cell poisoned"))
    }

    fn publish(&self, list: Arc<MatchList>, corpus_size: usize) {
        *self.matches.lock().expect("match cell poisoned") = list;
        self.searched_count.store(corpus_size, Ordering::Release);
        self.version.fetch_add(1, Ordering::Release);
    }

    pub fn fail(&self, message: String) {
        let mut slot = self.failure.lock().expect("failure cell poisoned");
        slot.get_or_insert(message);
    }

    pub fn take_failure(&self) -> Option<String> {
        self.failure.lock().expect("failure cell poisoned").take()
    }
}

pub fn spawn(
    matcher: Matcher,
    config: SearchConfig,
    shared: Arc<SearchShared>,
    pending: Arc<crate::reader::PendingLines>,
    bus: Arc<EventBus>,
    render: Option<Sender<RenderCommand>>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("sift-searcher".into())
        .spawn(move || {
            // A panic here must reach the UI thread so it can restore the
            // terminal before the process dies.
            let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                worker_loop(matcher, config, &shared, &pending, &bus, render.as_ref());
            }));
            if let Err(panic) = caught {
                shared.fail(format!("searcher panicked: {}", panic_message(&panic)));
            }
        })
        .expect("failed to spawn searcher thread")
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

fn worker_loop(
    mut matcher: Matcher,
    config: SearchConfig,
    shared: &SearchShared,
    pending: &crate::reader::PendingLines,
    bus: &Arc<EventBus>,
    render: Option<&Sender<RenderCommand>>,
) {
    let mut batches: Vec<Batch> = Vec::new();
    let mut cache = MatchCache::new();
    let mut query = QuerySnapshot::default();
    let mut backoff = BACKOFF_START;

    loop {
        let mut user_initiated = false;
        let mut dirty = false;

        for (_, event) in bus.take() {
            match event {
                Event::Key(snapshot) => {
                    query = snapshot;
                    user_initiated = true;
                    dirty = true;
                }
                Event::NewLines => {
                    let lines = pending.drain();
                    if lines.is_empty() {
                        continue;
                    }
                    shared.count.fetch_add(lines.len(), Ordering::Release);
                    shared.spinner.fetch_add(1, Ordering::Release);
                    batches.push(lines);
                    cache.clear();
                    dirty = true;
                }
                Event::Loaded => {
                    shared.loaded.store(true, Ordering::Release);
                    debug!(count = shared.count.load(Ordering::Acquire), "corpus loaded");
                }
                Event::WorkerFailed(message) => shared.fail(message),
                Event::Shutdown => return,
            }
        }

        if dirty && !batches.is_empty() {
            let token = bus.cancel_token();
            run_pass(
                &mut matcher,
                config,
                shared,
                &mut cache,
                &batches,
                &query,
                &token,
                render,
            );
        } else if dirty && batches.is_empty() {
            // Covers the empty-input corpus so scripting modes can decide.
            shared.publish(Arc::new(Vec::new()), 0);
        }

        if user_initiated {
            backoff = BACKOFF_START;
        } else if dirty {
            thread::sleep(backoff);
            backoff = (backoff * 2).min(BACKOFF_CAP);
        }
    }
}

/// One matcher pass over the corpus (or a cached seed universe). Returns
/// `false` when pre-empted by a fresher keystroke before publishing.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_pass(
    matcher: &mut Matcher,
    config: SearchConfig,
    shared: &SearchShared,
    cache: &mut MatchCache,
    batches: &[Batch],
    query: &QuerySnapshot,
    token: &CancelToken,
    render: Option<&Sender<RenderCommand>>,
) -> bool {
    let corpus_size: usize = batches.iter().map(Vec::len).sum();

    if matcher.is_empty(&query.text) {
        // Full corpus in arrival order; the rank step does not apply.
        let list: MatchList = batches
            .iter()
            .flatten()
            .map(|line| Match::new(Arc::clone(line), Vec::new()))
            .collect();
        shared.publish(Arc::new(list), corpus_size);
        return true;
    }

    let key = matcher.cache_key(&query.text);
    if let Some(hit) = cache.get(&key) {
        shared.publish(hit, corpus_size);
        return true;
    }

    let (prefix_keys, suffix_keys) = matcher.seed_keys(query.prefix(), query.suffix());
    let seed = cache.seed(&prefix_keys, &suffix_keys);
    let pattern = matcher.compile(&query.text);

    let started = Instant::now();
    let mut progress = Progress::new(render, corpus_size);

    let mut per_batch: Vec<Vec<Match>> = Vec::new();
    let aborted = match &seed {
        Some(universe) => {
            debug!(seed = universe.len(), "seeding from cached result");
            let mut out = Vec::new();
            let lines = universe.iter().map(|m| &m.line);
            if scan(matcher, &pattern, lines, token, &started, &mut progress, &mut out) {
                per_batch.push(out);
                false
            } else {
                true
            }
        }
        None => {
            let mut aborted = false;
            for batch in batches {
                let mut out = Vec::new();
                if !scan(matcher, &pattern, batch.iter(), token, &started, &mut progress, &mut out)
                {
                    aborted = true;
                    break;
                }
                per_batch.push(out);
            }
            aborted
        }
    };

    progress.finish();
    if aborted {
        return false;
    }

    let matched: usize = per_batch.iter().map(Vec::len).sum();
    let list: MatchList = if config.sort && matched <= config.sort_limit {
        let mut list: MatchList = per_batch.into_iter().flatten().collect();
        list.sort_by_cached_key(rank_key);
        list
    } else {
        // Newest batches first, arrival order preserved inside each batch.
        per_batch.into_iter().rev().flatten().collect()
    };

    let list = Arc::new(list);
    cache.insert(key, Arc::clone(&list));
    shared.publish(list, corpus_size);
    true
}

/// Rank key: tightly clustered matches first, then shorter lines, then
/// lexicographic. Stable sort keeps arrival order for full ties.
fn rank_key(entry: &Match) -> (usize, usize, Line) {
    (entry.span_len(), entry.line.len(), Arc::clone(&entry.line))
}

/// Scan one group of lines, honoring the cancellation token at a fixed
/// stride. Returns `false` when pre-empted.
fn scan<'a>(
    matcher: &mut Matcher,
    pattern: &crate::matcher::Pattern,
    lines: impl Iterator<Item = &'a Line>,
    token: &CancelToken,
    started: &Instant,
    progress: &mut Progress<'_>,
    out: &mut Vec<Match>,
) -> bool {
    for (scanned, line) in lines.enumerate() {
        if scanned % CANCEL_CHECK_INTERVAL == 0 {
            if token.cancelled() {
                return false;
            }
            progress.report(started);
        }
        if let Some(offsets) = matcher.match_line(pattern, line) {
            out.push(Match::new(Arc::clone(line), offsets));
        }
        progress.advance();
    }
    !token.cancelled()
}

/// Progress reporting for passes that outlive [`PROGRESS_AFTER`].
struct Progress<'a> {
    render: Option<&'a Sender<RenderCommand>>,
    total: usize,
    scanned: usize,
    shown: bool,
}

impl<'a> Progress<'a> {
    fn new(render: Option<&'a Sender<RenderCommand>>, total: usize) -> Self {
        Self {
            render,
            total,
            scanned: 0,
            shown: false,
        }
    }

    fn advance(&mut self) {
        self.scanned += 1;
    }

    fn report(&mut self, started: &Instant) {
        let Some(render) = self.render else { return };
        if self.total == 0 || started.elapsed() < PROGRESS_AFTER {
            return;
        }
        let pct = (self.scanned * 100 / self.total).min(100) as u8;
        let _ = render.send(RenderCommand::Progress(Some(pct)));
        self.shown = true;
    }

    fn finish(&mut self) {
        if self.shown
            && let Some(render) = self.render
        {
            let _ = render.send(RenderCommand::Progress(None));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{CaseMode, MatcherKind};
    use crate::reader::PendingLines;

    fn batch_of(lines: &[&str]) -> Batch {
        lines.iter().map(|line| Line::from(*line)).collect()
    }

    fn fuzzy() -> Matcher {
        Matcher::new(MatcherKind::Fuzzy, CaseMode::Smart)
    }

    fn pass(
        matcher: &mut Matcher,
        config: SearchConfig,
        shared: &SearchShared,
        cache: &mut MatchCache,
        batches: &[Batch],
        query: &str,
    ) -> bool {
        let bus = EventBus::new();
        let token = bus.cancel_token();
        run_pass(
            matcher,
            config,
            shared,
            cache,
            batches,
            &QuerySnapshot::new(query),
            &token,
            None,
        )
    }

    fn published_lines(shared: &SearchShared) -> Vec<String> {
        shared
            .matches()
            .iter()
            .map(|entry| entry.line.to_string())
            .collect()
    }

    #[test]
    fn rank_prefers_tight_spans_in_short_lines() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let batches = vec![batch_of(&["axxxxbxxxxc", "abXc"])];
        assert!(pass(
            &mut fuzzy(),
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "abc",
        ));
        assert_eq!(published_lines(&shared), vec!["abXc", "axxxxbxxxxc"]);

        // Whole-span offsets: `a[^a]*?b[^b]*?c` covers (0,4) and (0,11).
        let list = shared.matches();
        assert_eq!(list[0].span_len(), 4);
        assert_eq!(list[1].span_len(), 11);
    }

    #[test]
    fn empty_query_publishes_full_corpus_in_arrival_order() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let batches = vec![batch_of(&["one", "two"]), batch_of(&["three"])];
        assert!(pass(
            &mut fuzzy(),
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "",
        ));
        assert_eq!(published_lines(&shared), vec!["one", "two", "three"]);
        assert!(shared.matches().iter().all(|m| m.offsets.is_empty()));
    }

    #[test]
    fn unsorted_results_come_newest_batch_first() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let config = SearchConfig {
            sort: false,
            ..SearchConfig::default()
        };
        let batches = vec![batch_of(&["a1", "a2"]), batch_of(&["b1", "b2"])];
        assert!(pass(&mut fuzzy(), config, &shared, &mut cache, &batches, "1"));
        assert_eq!(published_lines(&shared), vec!["b1", "a1"]);
    }

    #[test]
    fn oversized_result_sets_skip_the_sort() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let config = SearchConfig {
            sort: true,
            sort_limit: 1,
        };
        let batches = vec![batch_of(&["zz1", "aa1"])];
        assert!(pass(&mut fuzzy(), config, &shared, &mut cache, &batches, "1"));
        // Two matches exceed the cap of one, so arrival order (one batch,
        // reversed batch list is a no-op) is preserved.
        assert_eq!(published_lines(&shared), vec!["zz1", "aa1"]);
    }

    #[test]
    fn ranking_is_idempotent() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let batches = vec![batch_of(&["bbb", "ab", "ba", "aab", "b"])];
        assert!(pass(
            &mut fuzzy(),
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "b",
        ));
        let once = shared.matches();
        let mut again: MatchList = once.iter().cloned().collect();
        again.sort_by_cached_key(rank_key);
        assert_eq!(*once, again);
    }

    #[test]
    fn cached_query_republishes_without_a_scan() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let mut matcher = fuzzy();
        let batches = vec![batch_of(&["alpha", "beta"])];
        assert!(pass(
            &mut matcher,
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "al",
        ));
        let first = shared.matches();
        assert!(pass(
            &mut matcher,
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "al",
        ));
        assert!(Arc::ptr_eq(&first, &shared.matches()));
    }

    #[test]
    fn seeded_scan_still_finds_the_narrowed_set() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let mut matcher = fuzzy();
        let batches = vec![batch_of(&["alpha", "beta", "algae"])];
        assert!(pass(
            &mut matcher,
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "al",
        ));
        assert_eq!(published_lines(&shared).len(), 2);
        assert!(pass(
            &mut matcher,
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "alg",
        ));
        assert_eq!(published_lines(&shared), vec!["algae"]);
    }

    #[test]
    fn prefix_growth_only_narrows_results() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let mut matcher = fuzzy();
        let batches = vec![batch_of(&["main.c", "Makefile", "README", "cmake"])];

        assert!(pass(
            &mut matcher,
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "m",
        ));
        let broad: std::collections::HashSet<String> =
            published_lines(&shared).into_iter().collect();

        assert!(pass(
            &mut matcher,
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            "mc",
        ));
        for line in published_lines(&shared) {
            assert!(broad.contains(&line));
        }
    }

    #[test]
    fn stale_token_aborts_without_publishing() {
        let shared = SearchShared::new();
        let mut cache = MatchCache::new();
        let mut matcher = fuzzy();
        let batches = vec![batch_of(&["alpha", "beta"])];

        let bus = EventBus::new();
        let token = bus.cancel_token();
        bus.emit(Event::Key(QuerySnapshot::new("fresh")));

        let before = shared.version.load(Ordering::Acquire);
        let published = run_pass(
            &mut matcher,
            SearchConfig::default(),
            &shared,
            &mut cache,
            &batches,
            &QuerySnapshot::new("al"),
            &token,
            None,
        );
        assert!(!published);
        assert_eq!(shared.version.load(Ordering::Acquire), before);
    }

    #[test]
    fn worker_thread_reacts_to_bus_events() {
        let shared = SearchShared::new();
        let pending = PendingLines::new();
        let bus = EventBus::new();
        let handle = spawn(
            fuzzy(),
            SearchConfig::default(),
            Arc::clone(&shared),
            Arc::clone(&pending),
            Arc::clone(&bus),
            None,
        );

        for line in ["one", "two", "three"] {
            pending.push(Line::from(line));
        }
        bus.emit(Event::NewLines);

        let deadline = Instant::now() + Duration::from_secs(2);
        while shared.version.load(Ordering::Acquire) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(published_lines(&shared), vec!["one", "two", "three"]);
        assert_eq!(shared.count.load(Ordering::Acquire), 3);
        assert_eq!(shared.spinner.load(Ordering::Acquire), 1);

        bus.emit(Event::Key(QuerySnapshot::new("tw")));
        let deadline = Instant::now() + Duration::from_secs(2);
        while published_lines(&shared) != vec!["two"] && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(published_lines(&shared), vec!["two"]);

        bus.emit(Event::Shutdown);
        handle.join().unwrap();
    }
}
