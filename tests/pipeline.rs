//! End-to-end pipeline tests: reader and searcher threads wired over the
//! event bus, exercised the way the interactive front end drives them.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use sift::events::{Event, EventBus};
use sift::matcher::{CaseMode, Matcher, MatcherKind};
use sift::reader::{self, PendingLines, Source};
use sift::searcher::{self, SearchConfig, SearchShared};
use sift::types::QuerySnapshot;

struct Pipeline {
    bus: Arc<EventBus>,
    shared: Arc<SearchShared>,
}

impl Pipeline {
    fn start(input: &str, kind: MatcherKind) -> Self {
        let bus = EventBus::new();
        let pending = PendingLines::new();
        let shared = SearchShared::new();
        let source = Source::Stream(Box::new(Cursor::new(input.as_bytes().to_vec())));
        let _reader = reader::spawn(source, Arc::clone(&pending), Arc::clone(&bus));
        let _searcher = searcher::spawn(
            Matcher::new(kind, CaseMode::Smart),
            SearchConfig::default(),
            Arc::clone(&shared),
            pending,
            Arc::clone(&bus),
            None,
        );
        Self { bus, shared }
    }

    /// Emit a `key` event and return the publish watermark to wait past.
    fn query(&self, text: &str) -> u64 {
        let watermark = self.shared.version.load(Ordering::Acquire);
        self.bus.emit(Event::Key(QuerySnapshot::new(text)));
        watermark
    }

    /// Wait until the searcher has published past `watermark` for a fully
    /// loaded corpus, then return the published lines.
    fn settled_lines(&self, watermark: u64) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let loaded = self.shared.loaded.load(Ordering::Acquire);
            let count = self.shared.count.load(Ordering::Acquire);
            let searched = self.shared.searched_count.load(Ordering::Acquire);
            let version = self.shared.version.load(Ordering::Acquire);
            if loaded && version > watermark && searched == count {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        self.shared
            .matches()
            .iter()
            .map(|entry| entry.line.to_string())
            .collect()
    }

    fn run_query(&self, text: &str) -> Vec<String> {
        let watermark = self.query(text);
        self.settled_lines(watermark)
    }

    fn shutdown(&self) {
        self.bus.emit(Event::Shutdown);
    }
}

#[test]
fn fuzzy_smart_case_narrows_to_the_only_subsequence() {
    let pipeline = Pipeline::start("Makefile\nmain.c\nREADME\n", MatcherKind::Fuzzy);
    assert_eq!(pipeline.run_query("mc"), vec!["main.c"]);

    let matches = pipeline.shared.matches();
    assert_eq!(matches[0].offsets, vec![(0, 6)]);
    pipeline.shutdown();
}

#[test]
fn clearing_the_query_restores_the_startup_view() {
    let pipeline = Pipeline::start("alpha\nbeta\ngamma\n", MatcherKind::Fuzzy);
    let initial = pipeline.run_query("");
    assert_eq!(initial, vec!["alpha", "beta", "gamma"]);

    assert_eq!(pipeline.run_query("bet"), vec!["beta"]);
    assert_eq!(pipeline.run_query(""), initial);
    pipeline.shutdown();
}

#[test]
fn appending_to_the_query_never_widens_the_result_set() {
    let corpus = "src/main.rs\nsrc/lib.rs\nREADME.md\nCargo.toml\nbuild.rs\n";
    let pipeline = Pipeline::start(corpus, MatcherKind::Fuzzy);

    let broad: std::collections::HashSet<String> =
        pipeline.run_query("r").into_iter().collect();

    for line in pipeline.run_query("rs") {
        assert!(broad.contains(&line), "{line} appeared from nowhere");
    }
    pipeline.shutdown();
}

#[test]
fn extended_query_combines_anchors_and_negation() {
    let pipeline = Pipeline::start("foo.rb\nfoo.py\nbar.py\n", MatcherKind::ExtendedFuzzy);
    assert_eq!(pipeline.run_query("^foo !rb"), vec!["foo.py"]);
    pipeline.shutdown();
}

#[test]
fn spinner_rotates_per_batch_and_count_tracks_lines() {
    let pipeline = Pipeline::start("one\ntwo\nthree\n", MatcherKind::Fuzzy);
    pipeline.run_query("");

    assert_eq!(pipeline.shared.count.load(Ordering::Acquire), 3);
    assert!(pipeline.shared.spinner.load(Ordering::Acquire) >= 1);
    assert!(pipeline.shared.loaded.load(Ordering::Acquire));
    pipeline.shutdown();
}
