//! Lowercase filter implementation.

use crate::analysis::token::Token;
use crate::analysis::token_filter::{Emit, TokenFilter};
use crate::error::Result;

/// A filter that converts tokens to lowercase.
///
/// Uses full Unicode case folding, so "ÉCOLE" becomes "école".
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    /// Create a new lowercase filter.
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl TokenFilter for LowercaseFilter {
    fn consume(&self, mut token: Token) -> Result<Emit> {
        if token.text.chars().any(char::is_uppercase) {
            token.text = token.text.to_lowercase();
        }
        Ok(Emit::One(token))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}
