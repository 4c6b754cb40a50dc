//! Field-restricted matching.
//!
//! When configured with 1-based field indices (negative counts from the
//! end), matching is attempted against each configured field in turn and
//! the first field that matches wins. Offsets are translated back to
//! absolute byte positions in the full line. Tokenization follows the AWK
//! rule by default (leading whitespace skipped, each field keeps its
//! trailing whitespace) or a user-supplied delimiter regex.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use super::QueryError;
use crate::types::{Line, Offset};

#[derive(Debug)]
enum Delimiter {
    Awk,
    Pattern(Regex),
}

#[derive(Debug)]
pub struct FieldScope {
    ranges: Vec<i32>,
    delimiter: Delimiter,
    tokens: HashMap<Line, Arc<Vec<Offset>>>,
}

impl FieldScope {
    /// Build a scope for the given indices and optional delimiter pattern.
    /// A delimiter that fails to compile as a regex is retried as a literal
    /// string.
    pub fn new(ranges: Vec<i32>, delimiter: Option<&str>) -> Self {
        let delimiter = match delimiter {
            None => Delimiter::Awk,
            Some(pattern) => {
                let regex = compile_delimiter(pattern).unwrap_or_else(|err| {
                    tracing::warn!(%err, "using the delimiter literally");
                    literal_delimiter(pattern)
                });
                Delimiter::Pattern(regex)
            }
        };
        Self {
            ranges,
            delimiter,
            tokens: HashMap::new(),
        }
    }

    /// Resolve the configured indices to absolute field spans for `line`,
    /// in configuration order. Out-of-range indices resolve to nothing.
    pub fn spans(&mut self, line: &Line) -> Vec<Offset> {
        let fields = self.fields(line);
        self.ranges
            .iter()
            .filter_map(|&index| {
                let resolved = if index > 0 {
                    (index - 1) as usize
                } else {
                    fields.len().checked_sub(index.unsigned_abs() as usize)?
                };
                fields.get(resolved).copied()
            })
            .collect()
    }

    fn fields(&mut self, line: &Line) -> Arc<Vec<Offset>> {
        if let Some(cached) = self.tokens.get(line) {
            return Arc::clone(cached);
        }
        let spans = match &self.delimiter {
            Delimiter::Awk => awk_fields(line),
            Delimiter::Pattern(regex) => pattern_fields(regex, line),
        };
        let spans = Arc::new(spans);
        self.tokens.insert(Arc::clone(line), Arc::clone(&spans));
        spans
    }
}

/// A delimiter pattern `D` becomes `(?:.*?D)|(?:.+?$)`: successive matches
/// cover the line as delimiter-terminated chunks with an undelimited tail.
fn compile_delimiter(pattern: &str) -> Result<Regex, QueryError> {
    Regex::new(&wrap_delimiter(pattern)).map_err(|source| QueryError::Delimiter {
        pattern: pattern.to_string(),
        source,
    })
}

fn literal_delimiter(pattern: &str) -> Regex {
    Regex::new(&wrap_delimiter(&regex::escape(pattern)))
        .expect("escaped delimiter always compiles")
}

fn wrap_delimiter(body: &str) -> String {
    format!("(?:.*?{body})|(?:.+?$)")
}

fn awk_fields(line: &str) -> Vec<Offset> {
    let mut spans = Vec::new();
    let bytes = line.as_bytes();
    let mut pos = skip_while(bytes, 0, |b| b.is_ascii_whitespace());
    while pos < bytes.len() {
        let start = pos;
        let word_end = skip_while(bytes, pos, |b| !b.is_ascii_whitespace());
        let field_end = skip_while(bytes, word_end, |b| b.is_ascii_whitespace());
        spans.push((start, field_end));
        pos = field_end;
    }
    spans
}

fn pattern_fields(regex: &Regex, line: &str) -> Vec<Offset> {
    regex
        .find_iter(line)
        .map(|found| (found.start(), found.end()))
        .filter(|(start, end)| end > start)
        .collect()
}

fn skip_while(bytes: &[u8], mut pos: usize, pred: impl Fn(u8) -> bool) -> usize {
    while pos < bytes.len() && pred(bytes[pos]) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> Line {
        Line::from(text)
    }

    #[test]
    fn awk_fields_keep_trailing_whitespace() {
        let mut scope = FieldScope::new(vec![1, 2], None);
        let sample = line("  alpha   beta");
        assert_eq!(scope.spans(&sample), vec![(2, 10), (10, 14)]);
    }

    #[test]
    fn second_field_spans_point_into_beta() {
        let mut scope = FieldScope::new(vec![2], None);
        let sample = line("  alpha   beta");
        let spans = scope.spans(&sample);
        assert_eq!(spans, vec![(10, 14)]);
        assert_eq!(&sample[spans[0].0..spans[0].1], "beta");
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let mut scope = FieldScope::new(vec![-1, -3], None);
        let sample = line("a b c");
        assert_eq!(scope.spans(&sample), vec![(4, 5), (0, 2)]);
    }

    #[test]
    fn out_of_range_indices_resolve_to_nothing() {
        let mut scope = FieldScope::new(vec![5, 1, -9], None);
        let sample = line("only two");
        assert_eq!(scope.spans(&sample), vec![(0, 5)]);
    }

    #[test]
    fn delimiter_regex_splits_into_terminated_chunks() {
        let mut scope = FieldScope::new(vec![1, 2, 3], Some(","));
        let sample = line("a,bb,ccc");
        assert_eq!(scope.spans(&sample), vec![(0, 2), (2, 5), (5, 8)]);
    }

    #[test]
    fn delimiter_that_never_matches_yields_one_field() {
        let mut scope = FieldScope::new(vec![1], Some(";"));
        let sample = line("no separators here");
        assert_eq!(scope.spans(&sample), vec![(0, 18)]);
    }

    #[test]
    fn delimiter_compile_failure_is_typed() {
        let err = compile_delimiter("(").unwrap_err();
        assert!(matches!(err, QueryError::Delimiter { .. }));
        assert!(err.to_string().contains("not a valid regex"));
    }

    #[test]
    fn invalid_delimiter_regex_falls_back_to_literal() {
        let mut scope = FieldScope::new(vec![1, 2], Some("("));
        let sample = line("a(b");
        assert_eq!(scope.spans(&sample), vec![(0, 2), (2, 3)]);
    }

    #[test]
    fn tokenization_is_memoized_per_line() {
        let mut scope = FieldScope::new(vec![1], None);
        let sample = line("cache me");
        scope.spans(&sample);
        scope.spans(&sample);
        assert_eq!(scope.tokens.len(), 1);
    }
}
