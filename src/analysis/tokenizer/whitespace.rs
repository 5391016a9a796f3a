//! Whitespace tokenizer implementation.

use super::{Tokenizer, subslice_offset};

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// A tokenizer that splits text on Unicode whitespace.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    /// Create a new whitespace tokenizer.
    pub fn new() -> Self {
        WhitespaceTokenizer
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        let tokens = text
            .split_whitespace()
            .enumerate()
            .map(move |(position, word)| {
                let start = subslice_offset(text, word);
                Token::with_offsets(word, position as u32, start, start + word.len())
            });
        Ok(Box::new(tokens))
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_tokenizer() {
        let tokenizer = WhitespaceTokenizer::new();
        let tokens: Vec<Token> = tokenizer
            .tokenize("  hello\tworld,  again\n")
            .unwrap()
            .collect();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "world,");
        assert_eq!(tokens[1].position, 1);
        assert_eq!(tokens[1].start_offset, 8);
        assert_eq!(tokens[2].end_offset, 21);
    }

    #[test]
    fn test_blank_input() {
        let tokenizer = WhitespaceTokenizer::new();
        assert_eq!(tokenizer.tokenize(" \t ").unwrap().count(), 0);
    }
}
