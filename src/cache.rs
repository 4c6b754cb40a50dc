//! Per-corpus match memoization with prefix/suffix seeding.
//!
//! For the current batch set the cache maps a query key to its match list.
//! When a new query arrives, the searcher looks for a cached result of a
//! shorter query derived from the text around the cursor and scans that
//! list instead of the whole corpus: fuzzy matches of a longer query are a
//! subset of the matches of any strict prefix (and of any suffix of the
//! part after the cursor). The cache is flushed whenever a batch arrives.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::MatchList;

#[derive(Default)]
pub struct MatchCache {
    map: HashMap<String, Arc<MatchList>>,
}

impl MatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every memoized result. Called on each `new` event.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn get(&self, key: &str) -> Option<Arc<MatchList>> {
        self.map.get(key).map(Arc::clone)
    }

    pub fn insert(&mut self, key: String, list: Arc<MatchList>) {
        self.map.insert(key, list);
    }

    /// Find the best seed universe for a query: the first cached hit from
    /// the prefix-derived keys and from the suffix-derived keys (both
    /// ordered best-first), whichever is smaller.
    pub fn seed(&self, prefix_keys: &[String], suffix_keys: &[String]) -> Option<Arc<MatchList>> {
        let from_prefix = prefix_keys.iter().find_map(|key| self.get(key));
        let from_suffix = suffix_keys.iter().find_map(|key| self.get(key));
        match (from_prefix, from_suffix) {
            (Some(a), Some(b)) => Some(if b.len() < a.len() { b } else { a }),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Match;

    fn list_of(lines: &[&str]) -> Arc<MatchList> {
        Arc::new(
            lines
                .iter()
                .map(|line| Match::new((*line).into(), Vec::new()))
                .collect(),
        )
    }

    #[test]
    fn seed_prefers_the_longest_cached_prefix() {
        let mut cache = MatchCache::new();
        cache.insert("a".into(), list_of(&["alpha", "beta", "gamma"]));
        cache.insert("ab".into(), list_of(&["alpha", "beta"]));

        let keys = vec!["ab".to_string(), "a".to_string()];
        let seed = cache.seed(&keys, &[]).unwrap();
        assert_eq!(seed.len(), 2);
    }

    #[test]
    fn seed_picks_the_smaller_of_prefix_and_suffix_hits() {
        let mut cache = MatchCache::new();
        cache.insert("ab".into(), list_of(&["one", "two", "three"]));
        cache.insert("yz".into(), list_of(&["one"]));

        let seed = cache
            .seed(&["ab".to_string()], &["yz".to_string()])
            .unwrap();
        assert_eq!(seed.len(), 1);
    }

    #[test]
    fn seed_misses_when_nothing_is_cached() {
        let cache = MatchCache::new();
        assert!(cache.seed(&["a".to_string()], &["b".to_string()]).is_none());
    }

    #[test]
    fn clear_flushes_all_entries() {
        let mut cache = MatchCache::new();
        cache.insert("q".into(), list_of(&["line"]));
        cache.clear();
        assert!(cache.get("q").is_none());
    }
}
