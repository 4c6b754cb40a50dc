//! Extended query syntax: a whitespace-separated conjunction of sub-terms.
//!
//! Each term must match for the line to qualify. `'word` forces an exact
//! substring, `^word` / `word$` / `^word$` anchor to the start, end, or the
//! whole line, and a leading `!` negates the term. Negated terms contribute
//! no offsets; the offsets of a qualifying line are the union of the spans
//! of all positive terms.

use regex::Regex;

use crate::types::Offset;

use super::fuzzy::{compile_lenient, fuzzy_source};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum TermKind {
    Fuzzy,
    Exact,
    Prefix,
    Suffix,
    Equal,
}

impl TermKind {
    fn tag(self) -> char {
        match self {
            TermKind::Fuzzy => 'f',
            TermKind::Exact => 'e',
            TermKind::Prefix => 'p',
            TermKind::Suffix => 's',
            TermKind::Equal => 'q',
        }
    }
}

#[derive(Debug)]
pub struct Term {
    inverse: bool,
    kind: TermKind,
    body: String,
    regex: Option<Regex>,
}

impl Term {
    fn find(&self, line: &str) -> Option<Offset> {
        self.regex
            .as_ref()
            .and_then(|regex| regex.find(line))
            .map(|found| (found.start(), found.end()))
    }

    fn signature(&self) -> String {
        let bang = if self.inverse { "!" } else { "" };
        format!("{bang}{}:{}", self.kind.tag(), self.body)
    }
}

/// Split a query into terms. Bare words are fuzzy unless `exact_default` is
/// set; anchored forms whose body is a single rune are dropped, as are
/// terms left empty after stripping their markers.
pub(super) fn parse_terms(query: &str, exact_default: bool, sensitive: bool) -> Vec<Term> {
    query
        .split_whitespace()
        .filter_map(|token| parse_term(token, exact_default, sensitive))
        .collect()
}

fn parse_term(token: &str, exact_default: bool, sensitive: bool) -> Option<Term> {
    let (inverse, rest) = match token.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let (kind, body) = if let Some(rest) = rest.strip_prefix('\'') {
        (TermKind::Exact, rest)
    } else if let Some(inner) = rest
        .strip_prefix('^')
        .and_then(|rest| rest.strip_suffix('$'))
    {
        (TermKind::Equal, inner)
    } else if let Some(rest) = rest.strip_prefix('^') {
        (TermKind::Prefix, rest)
    } else if let Some(rest) = rest.strip_suffix('$') {
        (TermKind::Suffix, rest)
    } else if exact_default {
        (TermKind::Exact, rest)
    } else {
        (TermKind::Fuzzy, rest)
    };

    if body.is_empty() {
        return None;
    }
    if matches!(kind, TermKind::Prefix | TermKind::Suffix | TermKind::Equal)
        && body.chars().count() == 1
    {
        return None;
    }

    let source = match kind {
        TermKind::Fuzzy => fuzzy_source(body),
        TermKind::Exact => regex::escape(body),
        TermKind::Prefix => format!("^{}", regex::escape(body)),
        TermKind::Suffix => format!("{}$", regex::escape(body)),
        TermKind::Equal => format!("^{}$", regex::escape(body)),
    };

    Some(Term {
        inverse,
        kind,
        body: body.to_string(),
        regex: compile_lenient(&source, sensitive),
    })
}

/// Match every term against `line`, collecting the offsets of the positive
/// ones. `None` as soon as a positive term misses or a negated term hits.
pub(super) fn match_terms(terms: &[Term], line: &str) -> Option<Vec<Offset>> {
    let mut offsets = Vec::with_capacity(terms.len());
    for term in terms {
        match (term.inverse, term.find(line)) {
            (false, Some(span)) => offsets.push(span),
            (false, None) | (true, Some(_)) => return None,
            (true, None) => {}
        }
    }
    Some(offsets)
}

/// Canonical cache key for a parsed term list; prefixes of the list produce
/// prefixes of the key space used for seed lookups.
pub(super) fn terms_signature(terms: &[Term]) -> String {
    let parts: Vec<String> = terms.iter().map(Term::signature).collect();
    parts.join("\u{1f}")
}
