//! `sift` is an interactive fuzzy finder: it reads newline-delimited
//! candidates, lets the user narrow them with a live query in a full-screen
//! terminal interface, and prints the confirmed selection on stdout.
//!
//! The crate splits into the concurrent engine (reader, searcher, event
//! bus, match cache, matcher family) and the interactive front end (state,
//! key dispatch, renderer). Headless scripting paths live in [`script`].

pub mod cache;
pub mod cli;
pub mod events;
pub mod logging;
pub mod matcher;
pub mod reader;
pub mod script;
pub mod searcher;
pub mod types;
pub mod ui;

pub use matcher::{CaseMode, Matcher, MatcherKind, QueryError};
pub use types::{Line, Match, MatchList, Offset, QuerySnapshot};
