//! The matcher family: plain fuzzy, extended boolean, and exact-extended
//! variants behind one dispatching type, with an optional field-restriction
//! decorator layered on top.

mod extended;
mod fields;
mod fuzzy;

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

pub use fields::FieldScope;

use crate::types::{Line, Offset};

/// Typed failure raised while compiling query or delimiter patterns.
///
/// Both cases are recovered locally (a bad delimiter falls back to its
/// literal form, a bad generated pattern degrades to never matching), so
/// these reach logs rather than the caller's control flow.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("delimiter {pattern:?} is not a valid regex: {source}")]
    Delimiter {
        pattern: String,
        source: regex::Error,
    },
    #[error("generated pattern {text:?} failed to compile: {source}")]
    Pattern { text: String, source: regex::Error },
}

/// Case policy for query compilation. `Smart` switches to sensitive when
/// the query contains any uppercase rune.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaseMode {
    #[default]
    Smart,
    Sensitive,
    Insensitive,
}

impl CaseMode {
    fn sensitive_for(self, query: &str) -> bool {
        match self {
            CaseMode::Sensitive => true,
            CaseMode::Insensitive => false,
            CaseMode::Smart => query.chars().any(char::is_uppercase),
        }
    }
}

/// Which matching grammar is in effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatcherKind {
    #[default]
    Fuzzy,
    ExtendedFuzzy,
    ExtendedExact,
}

/// A compiled query. `Everything` is the empty query, which selects the
/// whole corpus with no offsets.
pub enum Pattern {
    Everything,
    Fuzzy(Option<Regex>),
    Terms(Vec<extended::Term>),
}

impl Pattern {
    pub fn is_everything(&self) -> bool {
        matches!(self, Pattern::Everything)
            || matches!(self, Pattern::Terms(terms) if terms.is_empty())
    }
}

pub struct Matcher {
    kind: MatcherKind,
    case: CaseMode,
    fields: Option<FieldScope>,
    compiled: HashMap<String, Arc<Pattern>>,
}

impl Matcher {
    pub fn new(kind: MatcherKind, case: CaseMode) -> Self {
        Self {
            kind,
            case,
            fields: None,
            compiled: HashMap::new(),
        }
    }

    /// Wrap this matcher so it only considers the configured fields.
    pub fn with_fields(mut self, scope: FieldScope) -> Self {
        self.fields = Some(scope);
        self
    }

    /// Whether `query` selects the whole input.
    pub fn is_empty(&self, query: &str) -> bool {
        match self.kind {
            MatcherKind::Fuzzy => query.is_empty(),
            MatcherKind::ExtendedFuzzy | MatcherKind::ExtendedExact => {
                self.parse(query).is_empty()
            }
        }
    }

    /// Compile `query`, reusing a previously compiled pattern when the same
    /// text has been seen before.
    pub fn compile(&mut self, query: &str) -> Arc<Pattern> {
        if let Some(cached) = self.compiled.get(query) {
            return Arc::clone(cached);
        }
        let sensitive = self.case.sensitive_for(query);
        let pattern = match self.kind {
            MatcherKind::Fuzzy => {
                if query.is_empty() {
                    Pattern::Everything
                } else {
                    Pattern::Fuzzy(fuzzy::compile_fuzzy(query, sensitive))
                }
            }
            MatcherKind::ExtendedFuzzy | MatcherKind::ExtendedExact => {
                Pattern::Terms(self.parse(query))
            }
        };
        let pattern = Arc::new(pattern);
        self.compiled
            .insert(query.to_string(), Arc::clone(&pattern));
        pattern
    }

    /// Run `pattern` against a single candidate line.
    ///
    /// With a field scope configured, each configured field is tried in
    /// order and the first field that matches wins; offsets come back in
    /// absolute byte positions.
    pub fn match_line(&mut self, pattern: &Pattern, line: &Line) -> Option<Vec<Offset>> {
        if pattern.is_everything() {
            return Some(Vec::new());
        }
        match self.fields.as_mut() {
            None => match_text(pattern, line),
            Some(scope) => {
                for (start, end) in scope.spans(line) {
                    if let Some(mut offsets) = match_text(pattern, &line[start..end]) {
                        for offset in &mut offsets {
                            offset.0 += start;
                            offset.1 += start;
                        }
                        return Some(offsets);
                    }
                }
                None
            }
        }
    }

    /// Key under which this query's results are memoized. Fuzzy queries key
    /// on their text; extended queries key on the parsed term list so that
    /// whitespace variations and ignored fragments collapse.
    pub fn cache_key(&self, query: &str) -> String {
        match self.kind {
            MatcherKind::Fuzzy => query.to_string(),
            MatcherKind::ExtendedFuzzy | MatcherKind::ExtendedExact => {
                extended::terms_signature(&self.parse(query))
            }
        }
    }

    /// Cache keys of shorter queries whose results could seed this one,
    /// best (longest) candidates first. The first vector derives from the
    /// query prefix before the cursor, the second from the suffix after it.
    pub fn seed_keys(&self, prefix: &str, suffix: &str) -> (Vec<String>, Vec<String>) {
        match self.kind {
            MatcherKind::Fuzzy => {
                let prefix_chars: Vec<usize> =
                    prefix.char_indices().map(|(idx, _)| idx).collect();
                let from_prefix = prefix_chars
                    .iter()
                    .skip(1)
                    .rev()
                    .map(|&idx| prefix[..idx].to_string())
                    .collect();
                let suffix_chars: Vec<usize> =
                    suffix.char_indices().map(|(idx, _)| idx).collect();
                let from_suffix = suffix_chars
                    .iter()
                    .map(|&idx| suffix[idx..].to_string())
                    .collect();
                (from_prefix, from_suffix)
            }
            MatcherKind::ExtendedFuzzy | MatcherKind::ExtendedExact => {
                // Drop the final token fragment so a half-typed anchored or
                // negated term never contributes a bogus seed.
                let trimmed = match prefix.rfind(char::is_whitespace) {
                    Some(pos) => &prefix[..pos],
                    None => "",
                };
                let prefix_terms = self.parse(trimmed);
                let from_prefix = (1..=prefix_terms.len())
                    .rev()
                    .map(|n| extended::terms_signature(&prefix_terms[..n]))
                    .collect();
                let suffix_terms = self.parse(suffix);
                let from_suffix = (0..suffix_terms.len())
                    .map(|n| extended::terms_signature(&suffix_terms[n..]))
                    .collect();
                (from_prefix, from_suffix)
            }
        }
    }

    fn parse(&self, query: &str) -> Vec<extended::Term> {
        let sensitive = self.case.sensitive_for(query);
        extended::parse_terms(query, self.kind == MatcherKind::ExtendedExact, sensitive)
    }
}

fn match_text(pattern: &Pattern, text: &str) -> Option<Vec<Offset>> {
    match pattern {
        Pattern::Everything => Some(Vec::new()),
        Pattern::Fuzzy(regex) => regex
            .as_ref()
            .and_then(|regex| regex.find(text))
            .map(|found| vec![(found.start(), found.end())]),
        Pattern::Terms(terms) => extended::match_terms(terms, text),
    }
}
