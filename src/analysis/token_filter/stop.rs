//! Stop filter implementation.

use ahash::AHashSet;

use crate::analysis::token::Token;
use crate::analysis::token_filter::{Emit, TokenFilter};
use crate::error::Result;

/// Default English stop words list.
pub const DEFAULT_ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// A filter that removes stop words from the token stream.
///
/// Removed words leave a gap in positions, so "quick the fox" still
/// has "fox" two positions after "quick".
///
/// ```
/// use glaive::analysis::token::Token;
/// use glaive::analysis::token_filter::{Emit, TokenFilter};
/// use glaive::analysis::token_filter::stop::StopFilter;
///
/// let filter = StopFilter::new();
/// assert_eq!(filter.consume(Token::new("the", 0)).unwrap(), Emit::Drop);
/// ```
#[derive(Clone, Debug)]
pub struct StopFilter {
    stop_words: AHashSet<String>,
}

impl StopFilter {
    /// Create a stop filter with the default English list.
    pub fn new() -> Self {
        Self::from_words(DEFAULT_ENGLISH_STOP_WORDS.iter().copied())
    }

    /// Create a stop filter from a custom word list.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopFilter {
            stop_words: words.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a word is a stop word.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// Number of stop words.
    pub fn len(&self) -> usize {
        self.stop_words.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.stop_words.is_empty()
    }
}

impl Default for StopFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenFilter for StopFilter {
    fn consume(&self, token: Token) -> Result<Emit> {
        if self.is_stop_word(&token.text) {
            Ok(Emit::Drop)
        } else {
            Ok(Emit::One(token))
        }
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_list() {
        let filter = StopFilter::new();
        assert_eq!(filter.len(), DEFAULT_ENGLISH_STOP_WORDS.len());
        assert_eq!(filter.consume(Token::new("and", 1)).unwrap(), Emit::Drop);
        assert_eq!(
            filter.consume(Token::new("fox", 2)).unwrap(),
            Emit::One(Token::new("fox", 2))
        );
    }

    #[test]
    fn test_custom_list_is_case_sensitive() {
        let filter = StopFilter::from_words(["foo"]);
        assert!(filter.is_stop_word("foo"));
        assert!(!filter.is_stop_word("Foo"));
    }
}
