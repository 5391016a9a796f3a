//! Token filter implementations for token transformation.
//!
//! A filter is a pipeline stage that consumes one token at a time and emits
//! zero, one or two tokens in its place.
//!
//! # Available Filters
//!
//! - [`lowercase::LowercaseFilter`] - Converts tokens to lowercase
//! - [`stop::StopFilter`] - Removes stop words
//! - [`stem::StemFilter`] - Replaces words with their Snowball stem
//! - [`stem::StemPrefixFilter`] - Emits the stem and the unstemmed word
//! - [`length::LengthFilter`] - Drops tokens outside a length range
//!
//! # Examples
//!
//! ```
//! use glaive::analysis::token::Token;
//! use glaive::analysis::token_filter::{Emit, TokenFilter};
//! use glaive::analysis::token_filter::lowercase::LowercaseFilter;
//!
//! let filter = LowercaseFilter::new();
//! let emitted = filter.consume(Token::new("Hello", 0)).unwrap();
//! assert_eq!(emitted, Emit::One(Token::new("hello", 0)));
//! ```

pub mod length;
pub mod lowercase;
pub mod stem;
pub mod stop;

use crate::analysis::token::Token;
use crate::error::Result;

/// What a filter emits for one consumed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit {
    /// The token is removed.
    Drop,
    /// The token is replaced by one token.
    One(Token),
    /// The token is replaced by two tokens, emitted in this order.
    Two(Token, Token),
}

impl Emit {
    /// Number of emitted tokens.
    pub fn len(&self) -> usize {
        match self {
            Emit::Drop => 0,
            Emit::One(_) => 1,
            Emit::Two(_, _) => 2,
        }
    }

    /// Whether nothing is emitted.
    pub fn is_empty(&self) -> bool {
        matches!(self, Emit::Drop)
    }
}

/// Trait for pipeline stages.
///
/// An error means the stage could not process this particular token; the
/// pipeline recovers locally and keeps going.
pub trait TokenFilter: Send + Sync {
    /// Process one token.
    fn consume(&self, token: Token) -> Result<Emit>;

    /// Get the name of this filter.
    fn name(&self) -> &'static str;

    /// Whether this filter emits tokens on the surface channel.
    fn emits_surface(&self) -> bool {
        false
    }
}
