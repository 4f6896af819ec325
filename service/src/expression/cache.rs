//! LRU cache of parsed expressions
//!
//! `must`, `when` and `path` statements are re-evaluated on every request,
//! so the parsed form is kept keyed by the expression text.

use super::ast::Expr;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Statistics for cache performance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that found a parsed expression
    pub hits: u64,
    /// Lookups that had to parse
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries currently cached
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                self.hits as f64 / total as f64
            }
        }
    }
}

struct Inner {
    entries: LruCache<String, Arc<Expr>>,
    stats: CacheStats,
}

/// Thread-safe parse cache
pub struct ExpressionCache {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache").field("stats", &self.stats()).finish()
    }
}

impl ExpressionCache {
    /// Cache holding at most `capacity` expressions, at least one
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Parsed form of `text`, counting a hit or a miss
    pub fn get(&self, text: &str) -> Option<Arc<Expr>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(text).cloned() {
            Some(expr) => {
                inner.stats.hits += 1;
                Some(expr)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Store the parsed form of `text`
    pub fn insert(&self, text: &str, expr: Arc<Expr>) {
        let mut inner = self.inner.lock();
        if inner.entries.len() == inner.entries.cap().get() && !inner.entries.contains(text) {
            inner.stats.evictions += 1;
        }
        inner.entries.put(text.to_string(), expr);
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }

    /// Drop every entry and reset the statistics
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.stats = CacheStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_misses_and_evictions() {
        let cache = ExpressionCache::new(2);
        assert!(cache.get("a").is_none());
        cache.insert("a", Arc::new(Expr::Number(1.0)));
        cache.insert("b", Arc::new(Expr::Number(2.0)));
        assert!(cache.get("a").is_some());
        cache.insert("c", Arc::new(Expr::Number(3.0)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 2);
        assert!(cache.get("b").is_none());
        assert!((cache.stats().hit_rate() - 1.0 / 3.0).abs() < f64::EPSILON);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
