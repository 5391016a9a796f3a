//! Snowball stemming filters.
//!
//! [`StemFilter`] replaces each word with its stem. [`StemPrefixFilter`]
//! additionally keeps the unstemmed word on the surface channel at the same
//! position, so exact and prefix queries both find "running" while term
//! queries for "run" still match through the stem.

use std::fmt;

use rust_stemmers::Stemmer;

use crate::analysis::analyzer::language::Language;
use crate::analysis::token::{Channel, Token};
use crate::analysis::token_filter::{Emit, TokenFilter};
use crate::error::{GlaiveError, Result};

/// Stemmers cannot make sense of text that lost characters while decoding.
fn check_stemmable(token: &Token) -> Result<()> {
    if token.text.contains(char::REPLACEMENT_CHARACTER) {
        return Err(GlaiveError::analysis(format!(
            "token at position {} contains undecodable characters",
            token.position
        )));
    }
    Ok(())
}

/// Replaces every token with its Snowball stem.
pub struct StemFilter {
    language: Language,
    stemmer: Stemmer,
}

impl StemFilter {
    /// Create a stemmer for `language`.
    pub fn new(language: Language) -> Self {
        StemFilter {
            language,
            stemmer: Stemmer::create(language.algorithm()),
        }
    }

    /// The stemming language.
    pub fn language(&self) -> Language {
        self.language
    }
}

impl fmt::Debug for StemFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StemFilter")
            .field("language", &self.language)
            .finish()
    }
}

impl TokenFilter for StemFilter {
    fn consume(&self, token: Token) -> Result<Emit> {
        check_stemmable(&token)?;
        let stemmed = self.stemmer.stem(&token.text).into_owned();
        Ok(Emit::One(token.with_text(stemmed)))
    }

    fn name(&self) -> &'static str {
        "stem"
    }
}

/// Emits the stem on the main channel and the original word on the
/// surface channel, both at the input token's position.
///
/// ```
/// use glaive::analysis::analyzer::language::Language;
/// use glaive::analysis::token::{Channel, Token};
/// use glaive::analysis::token_filter::{Emit, TokenFilter};
/// use glaive::analysis::token_filter::stem::StemPrefixFilter;
///
/// let filter = StemPrefixFilter::new(Language::English);
/// match filter.consume(Token::new("running", 0)).unwrap() {
///     Emit::Two(main, surface) => {
///         assert_eq!((main.text.as_str(), main.channel), ("run", Channel::Main));
///         assert_eq!((surface.text.as_str(), surface.channel), ("running", Channel::Surface));
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub struct StemPrefixFilter {
    inner: StemFilter,
}

impl StemPrefixFilter {
    /// Create a prefix-preserving stemmer for `language`.
    pub fn new(language: Language) -> Self {
        StemPrefixFilter {
            inner: StemFilter::new(language),
        }
    }

    /// The stemming language.
    pub fn language(&self) -> Language {
        self.inner.language
    }
}

impl fmt::Debug for StemPrefixFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StemPrefixFilter")
            .field("language", &self.inner.language)
            .finish()
    }
}

impl TokenFilter for StemPrefixFilter {
    fn consume(&self, token: Token) -> Result<Emit> {
        check_stemmable(&token)?;
        let stemmed = self.inner.stemmer.stem(&token.text).into_owned();
        let main = token.clone().with_text(stemmed).on_channel(Channel::Main);
        let surface = token.on_channel(Channel::Surface);
        Ok(Emit::Two(main, surface))
    }

    fn name(&self) -> &'static str {
        "stem_prefix"
    }

    fn emits_surface(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_filter() {
        let filter = StemFilter::new(Language::English);
        let emitted = filter.consume(Token::new("connections", 2)).unwrap();
        assert_eq!(emitted, Emit::One(Token::new("connect", 2)));
    }

    #[test]
    fn test_stem_prefix_keeps_unchanged_words_on_both_channels() {
        let filter = StemPrefixFilter::new(Language::English);
        match filter.consume(Token::new("fox", 5)).unwrap() {
            Emit::Two(main, surface) => {
                assert_eq!(main.text, "fox");
                assert_eq!(surface.text, "fox");
                assert_eq!(main.position, surface.position);
                assert_eq!(surface.channel, Channel::Surface);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(filter.emits_surface());
    }

    #[test]
    fn test_replacement_characters_fail() {
        let filter = StemFilter::new(Language::English);
        let err = filter.consume(Token::new("ca\u{FFFD}s", 0)).unwrap_err();
        assert!(matches!(err, GlaiveError::Analysis(_)));

        let filter = StemPrefixFilter::new(Language::French);
        assert!(filter.consume(Token::new("\u{FFFD}", 0)).is_err());
    }
}
