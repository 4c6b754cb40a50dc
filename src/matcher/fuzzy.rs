//! Fuzzy pattern construction.
//!
//! A query `c₁ c₂ … cₙ` compiles to the regex `c₁ [^c₁]*? c₂ [^c₂]*? … cₙ`:
//! between consecutive query runes the scan may only cross characters that
//! differ from the rune just matched, lazily. This pins every query rune to
//! its leftmost unconsumed occurrence and yields one canonical match span.
//! The avoid-the-previous-rune class is applied uniformly to all runes,
//! multi-byte ones included.

use regex::Regex;

use super::QueryError;

/// Build the fuzzy regex source for `query`. Empty queries produce an empty
/// source; callers treat those as match-everything before compiling.
pub(super) fn fuzzy_source(query: &str) -> String {
    let mut source = String::with_capacity(query.len() * 8);
    let mut previous: Option<char> = None;
    for rune in query.chars() {
        if let Some(prev) = previous {
            source.push_str("[^");
            push_class_escaped(&mut source, prev);
            source.push_str("]*?");
        }
        let mut literal = [0u8; 4];
        source.push_str(&regex::escape(rune.encode_utf8(&mut literal)));
        previous = Some(rune);
    }
    source
}

/// Compile a fuzzy query into a regex, honoring case sensitivity.
pub(super) fn compile_fuzzy(query: &str, sensitive: bool) -> Option<Regex> {
    compile_lenient(&fuzzy_source(query), sensitive)
}

/// Compile one of the matcher's generated regex sources.
pub(super) fn compile_source(source: &str, sensitive: bool) -> Result<Regex, QueryError> {
    let flagged = if sensitive {
        source.to_string()
    } else {
        format!("(?i){source}")
    };
    Regex::new(&flagged).map_err(|err| QueryError::Pattern {
        text: source.to_string(),
        source: err,
    })
}

/// Like [`compile_source`], but degrade to a never-matching pattern. The
/// sources are built from escaped user input, so a failure here indicates a
/// bug in pattern generation rather than bad input.
pub(super) fn compile_lenient(source: &str, sensitive: bool) -> Option<Regex> {
    match compile_source(source, sensitive) {
        Ok(regex) => Some(regex),
        Err(err) => {
            tracing::warn!(%err, "degrading to a never-matching pattern");
            None
        }
    }
}

/// Escape `rune` for use inside a negated character class.
fn push_class_escaped(source: &mut String, rune: char) {
    if matches!(rune, '\\' | ']' | '[' | '^' | '-' | '&' | '~') {
        source.push('\\');
        source.push(rune);
    } else if rune.is_ascii_control() {
        source.push_str(&format!("\\x{:02x}", rune as u32));
    } else {
        source.push(rune);
    }
}
