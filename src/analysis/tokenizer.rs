//! Tokenizer implementations for text analysis.
//!
//! Tokenizers are the first step of an analysis pipeline: they split the
//! input into tokens and number them with consecutive positions.
//!
//! # Available Tokenizers
//!
//! - [`unicode_word::UnicodeWordTokenizer`] - Unicode word boundaries (UAX #29)
//! - [`whitespace::WhitespaceTokenizer`] - Splits on whitespace characters
//! - [`regex::RegexTokenizer`] - Tokens are the matches of a pattern
//! - [`keyword::KeywordTokenizer`] - The whole input as one token
//!
//! # Examples
//!
//! ```
//! use glaive::analysis::tokenizer::Tokenizer;
//! use glaive::analysis::tokenizer::whitespace::WhitespaceTokenizer;
//!
//! let tokenizer = WhitespaceTokenizer::new();
//! let tokens: Vec<_> = tokenizer.tokenize("Hello world").unwrap().collect();
//! assert_eq!(tokens.len(), 2);
//! ```

pub mod keyword;
pub mod regex;
pub mod unicode_word;
pub mod whitespace;

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for tokenizers that convert text into tokens.
///
/// The returned stream borrows only the text, never the tokenizer, so an
/// analyzer can hand it out independently of its own lifetime.
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into a lazy stream of tokens.
    fn tokenize<'a>(&self, text: &'a str) -> Result<TokenStream<'a>>;

    /// Get the name of this tokenizer.
    fn name(&self) -> &'static str;
}

/// Byte offset of `part` inside `whole`; `part` must be a subslice of it.
pub(crate) fn subslice_offset(whole: &str, part: &str) -> usize {
    part.as_ptr() as usize - whole.as_ptr() as usize
}
