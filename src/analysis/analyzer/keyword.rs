//! Verbatim analyzer for `id`, `obj` and other exact-match fields.
//!
//! ```
//! use glaive::analysis::analyzer::analyzer::Analyzer;
//! use glaive::analysis::analyzer::keyword::KeywordAnalyzer;
//!
//! let tokens: Vec<_> = KeywordAnalyzer::new().analyze("Doc-42").unwrap().collect();
//! assert_eq!(tokens.len(), 1);
//! assert_eq!(tokens[0].text, "Doc-42");
//! ```

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::tokenizer::Tokenizer;
use crate::analysis::tokenizer::keyword::KeywordTokenizer;
use crate::error::Result;

/// No case folding, no stemming, no stop words.
#[derive(Clone, Debug, Default)]
pub struct KeywordAnalyzer {
    tokenizer: KeywordTokenizer,
}

impl KeywordAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        self.tokenizer.tokenize(text)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
