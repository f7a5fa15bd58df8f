//! Pattern cache - LRU of compiled REGEXP and LIKE patterns
//!
//! Engine functions run once per row, so the same pattern text is compiled
//! over and over within one statement. Both caches are keyed by the pattern
//! text plus the flags that change its meaning.

use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::num::NonZeroUsize;

/// Cache statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Maximum entries per cache
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type LikeKey = (String, Option<char>, bool);

pub struct PatternCache {
    regexes: Mutex<LruCache<(String, bool), Regex>>,
    likes: Mutex<LruCache<LikeKey, Regex>>,
    stats: Mutex<CacheStats>,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            regexes: Mutex::new(LruCache::new(size)),
            likes: Mutex::new(LruCache::new(size)),
            stats: Mutex::new(CacheStats {
                hits: 0,
                misses: 0,
                capacity,
            }),
        }
    }

    /// Compiled `REGEXP` pattern.
    pub fn regex(&self, pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
        let key = (pattern.to_string(), case_insensitive);
        if let Some(re) = self.regexes.lock().get(&key) {
            self.stats.lock().hits += 1;
            return Ok(re.clone());
        }
        self.stats.lock().misses += 1;
        let re = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        self.regexes.lock().put(key, re.clone());
        Ok(re)
    }

    /// `LIKE` pattern compiled to an anchored regex.
    pub fn like(&self, pattern: &str, escape: Option<char>, case_insensitive: bool) -> Result<Regex, regex::Error> {
        let key = (pattern.to_string(), escape, case_insensitive);
        if let Some(re) = self.likes.lock().get(&key) {
            self.stats.lock().hits += 1;
            return Ok(re.clone());
        }
        self.stats.lock().misses += 1;
        let re = compile_like(pattern, escape, case_insensitive)?;
        self.likes.lock().put(key, re.clone());
        Ok(re)
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(256)
    }
}

fn compile_like(pattern: &str, escape: Option<char>, case_insensitive: bool) -> Result<Regex, regex::Error> {
    let mut source = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            // a trailing escape matches itself
            let literal = chars.next().unwrap_or(c);
            source.push_str(&regex::escape(&literal.to_string()));
        } else if c == '%' {
            source.push_str(".*");
        } else if c == '_' {
            source.push('.');
        } else {
            source.push_str(&regex::escape(&c.to_string()));
        }
    }
    source.push('$');
    RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_wildcards() {
        let cache = PatternCache::default();
        let re = cache.like("ab%_", Some('\\'), true).unwrap();
        assert!(re.is_match("ABcd"));
        assert!(!re.is_match("ab"));
    }

    #[test]
    fn test_like_escape() {
        let cache = PatternCache::default();
        let literal = cache.like("abc\\%", Some('\\'), true).unwrap();
        assert!(literal.is_match("abc%"));
        assert!(!literal.is_match("abcd"));

        let raw = cache.like("abc\\%", None, true).unwrap();
        assert!(raw.is_match("abc\\xyz"));
        assert!(!raw.is_match("abc%"));
    }

    #[test]
    fn test_hits_are_counted() {
        let cache = PatternCache::new(4);
        cache.regex("^a+$", true).unwrap();
        cache.regex("^a+$", true).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(cache.regex("(", false).is_err());
    }
}
