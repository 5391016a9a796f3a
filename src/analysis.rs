//! Text analysis: tokenizers, filter stages and analyzers.
//!
//! An analyzer turns field text into a lazy stream of [`Token`]s. Tokenizers
//! split the text; each [`TokenFilter`] stage then consumes one token at a
//! time and emits zero, one or two tokens. A stage that fails on a token
//! does not abort the stream: the token is replaced by an empty one at the
//! same position, which the indexer skips.
//!
//! ```
//! use glaive::analysis::{Language, analyze};
//!
//! let terms: Vec<String> = analyze("Connected devices", Language::English)
//!     .unwrap()
//!     .map(|t| t.text)
//!     .collect();
//! assert_eq!(terms, vec!["connect", "connected", "devic", "devices"]);
//! ```

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

use crate::error::Result;

pub use analyzer::{
    Analyzer, KeywordAnalyzer, Language, PerFieldAnalyzer, PipelineAnalyzer, SnowballAnalyzer,
    StandardAnalyzer,
};
pub use token::{Channel, Token, TokenStream};
pub use token_filter::{Emit, TokenFilter};
pub use tokenizer::Tokenizer;

/// Analyze field text with the Snowball analyzer for `language`.
///
/// Words are lowercased, the language's stop words removed and each word is
/// emitted as its stem followed by its unstemmed form.
pub fn analyze(text: &str, language: Language) -> Result<TokenStream<'_>> {
    SnowballAnalyzer::new(language).analyze(text)
}
