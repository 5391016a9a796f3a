//! Whole-input tokenizer for identifiers and type codes.

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// Emits the input unchanged as one token at position 0.
///
/// Empty input yields no token, so an empty identifier is never indexed.
#[derive(Clone, Debug, Default)]
pub struct KeywordTokenizer;

impl KeywordTokenizer {
    pub fn new() -> Self {
        KeywordTokenizer
    }
}

impl Tokenizer for KeywordTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        let token = (!text.is_empty()).then(|| Token::with_offsets(text, 0, 0, text.len()));
        Ok(Box::new(token.into_iter()))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
