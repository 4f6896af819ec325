//! XSD regular expressions used by `pattern` statements and `re-match()`
//!
//! Patterns are translated to the `regex` dialect by
//! [`yang_core::schema::xsd_regex`] and the compiled form is kept in a
//! process-wide LRU cache. Compiled regexes are immutable, so sharing them
//! between requests is safe.

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use yang_core::schema::xsd_regex;

const CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

static PATTERN_CACHE: Lazy<Mutex<LruCache<String, Arc<Regex>>>> =
    Lazy::new(|| Mutex::new(LruCache::new(CACHE_CAPACITY)));

/// Compile an XSD pattern for whole-value matching, using the shared cache
///
/// # Errors
///
/// Returns the regex error if the translated pattern does not compile.
pub fn compile_xsd(pattern: &str) -> Result<Arc<Regex>, regex::Error> {
    if let Some(regex) = PATTERN_CACHE.lock().get(pattern) {
        return Ok(Arc::clone(regex));
    }
    let regex = Arc::new(Regex::new(&xsd_regex(pattern))?);
    PATTERN_CACHE
        .lock()
        .put(pattern.to_string(), Arc::clone(&regex));
    Ok(regex)
}

/// Whether `value` matches the XSD `pattern` as a whole
///
/// # Errors
///
/// Returns the regex error if the pattern does not compile.
pub fn matches_xsd(pattern: &str, value: &str) -> Result<bool, regex::Error> {
    Ok(compile_xsd(pattern)?.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_are_anchored() {
        assert!(matches_xsd("[a-z]+", "abc").unwrap());
        assert!(!matches_xsd("[a-z]+", "abc1").unwrap());
        assert!(!matches_xsd("b", "abc").unwrap());
    }

    #[test]
    fn test_caret_and_dollar_are_literal() {
        assert!(matches_xsd("a^b$", "a^b$").unwrap());
        assert!(matches_xsd("[^0-9]+", "ab").unwrap());
    }

    #[test]
    fn test_name_classes() {
        assert!(matches_xsd("\\i\\c*", "if-name.1").unwrap());
        assert!(!matches_xsd("\\i\\c*", "1abc").unwrap());
    }

    #[test]
    fn test_class_subtraction() {
        assert!(matches_xsd("[a-z-[aeiou]]+", "xyz").unwrap());
        assert!(!matches_xsd("[a-z-[aeiou]]+", "xaz").unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(compile_xsd("(unclosed").is_err());
    }
}
