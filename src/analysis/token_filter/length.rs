//! Length filter implementation.

use crate::analysis::token::Token;
use crate::analysis::token_filter::{Emit, TokenFilter};
use crate::error::Result;

/// Drops tokens whose character count is outside `min..=max`.
#[derive(Clone, Debug)]
pub struct LengthFilter {
    min: usize,
    max: usize,
}

impl LengthFilter {
    /// Create a filter keeping tokens of `min..=max` characters.
    pub fn new(min: usize, max: usize) -> Self {
        LengthFilter { min, max }
    }
}

impl Default for LengthFilter {
    fn default() -> Self {
        LengthFilter::new(1, 255)
    }
}

impl TokenFilter for LengthFilter {
    fn consume(&self, token: Token) -> Result<Emit> {
        let length = token.text.chars().count();
        if length < self.min || length > self.max {
            Ok(Emit::Drop)
        } else {
            Ok(Emit::One(token))
        }
    }

    fn name(&self) -> &'static str {
        "length"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds_count_chars() {
        let filter = LengthFilter::new(2, 3);

        assert_eq!(filter.consume(Token::new("a", 0)).unwrap(), Emit::Drop);
        assert!(matches!(filter.consume(Token::new("ab", 0)).unwrap(), Emit::One(_)));
        assert!(matches!(filter.consume(Token::new("été", 0)).unwrap(), Emit::One(_)));
        assert_eq!(filter.consume(Token::new("abcd", 0)).unwrap(), Emit::Drop);
    }
}
