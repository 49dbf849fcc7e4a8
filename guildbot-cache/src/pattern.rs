//! Key patterns for bulk invalidation.
//!
//! A glob only understands `*` (any substring, possibly empty). Everything else is
//! matched literally, and the match is unanchored: `user:*` also matches
//! `banned_user:7`. Use [`KeyPattern::regex`] when anchoring or richer syntax is needed.

use regex::Regex;

use crate::error::CacheError;

/// A compiled key pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    /// Compiles a `*`-glob into a pattern.
    pub fn glob(pattern: &str) -> Result<Self, CacheError> {
        let source = regex::escape(pattern).replace(r"\*", ".*");
        Ok(Self {
            regex: Regex::new(&source)?,
        })
    }

    /// Compiles a regular expression into a pattern.
    pub fn regex(pattern: &str) -> Result<Self, CacheError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Returns true if `key` matches.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// The regular expression this pattern was compiled to.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl From<Regex> for KeyPattern {
    fn from(regex: Regex) -> Self {
        Self { regex }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_star_matches_substring() {
        let pattern = KeyPattern::glob("user:*").unwrap();
        assert!(pattern.matches("user:1"));
        assert!(pattern.matches("user:"));
        assert!(!pattern.matches("post:1"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let pattern = KeyPattern::glob("quote.list(1)*").unwrap();
        assert!(pattern.matches("quote.list(1):page2"));
        assert!(!pattern.matches("quoteXlist(1)"));
    }

    #[test]
    fn test_glob_question_mark_is_literal() {
        let pattern = KeyPattern::glob("a?c").unwrap();
        assert!(pattern.matches("a?c"));
        assert!(!pattern.matches("abc"));
    }

    #[test]
    fn test_glob_is_unanchored() {
        let pattern = KeyPattern::glob("user:*").unwrap();
        assert!(pattern.matches("banned_user:7"));
    }

    #[test]
    fn test_regex_pattern() {
        let pattern = KeyPattern::regex(r"^quotes:\d+$").unwrap();
        assert!(pattern.matches("quotes:42"));
        assert!(!pattern.matches("quotes:42:page"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        assert!(matches!(
            KeyPattern::regex("(unclosed"),
            Err(CacheError::Pattern(_))
        ));
    }
}
