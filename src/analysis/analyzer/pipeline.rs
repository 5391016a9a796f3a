//! Pipeline analyzer that combines a tokenizer with filter stages.
//!
//! ```
//! use std::sync::Arc;
//!
//! use glaive::analysis::analyzer::analyzer::Analyzer;
//! use glaive::analysis::analyzer::pipeline::PipelineAnalyzer;
//! use glaive::analysis::token_filter::lowercase::LowercaseFilter;
//! use glaive::analysis::token_filter::stop::StopFilter;
//! use glaive::analysis::tokenizer::regex::RegexTokenizer;
//!
//! let tokenizer = Arc::new(RegexTokenizer::new().unwrap());
//! let analyzer = PipelineAnalyzer::new(tokenizer)
//!     .add_filter(Arc::new(LowercaseFilter::new()))
//!     .add_filter(Arc::new(StopFilter::from_words(vec!["the", "and"])))
//!     .with_name("my_custom_analyzer");
//!
//! let tokens: Vec<_> = analyzer.analyze("Hello THE world AND test").unwrap().collect();
//!
//! assert_eq!(tokens.len(), 3);
//! assert_eq!(tokens[0].text, "hello");
//! assert_eq!(tokens[1].position, 2);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use log::warn;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::token::{Token, TokenStream};
use crate::analysis::token_filter::{Emit, TokenFilter};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// A configurable analyzer that combines a tokenizer with a chain of filters.
#[derive(Clone)]
pub struct PipelineAnalyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn TokenFilter>>,
    name: String,
}

impl PipelineAnalyzer {
    /// Create a new pipeline analyzer with the given tokenizer.
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        PipelineAnalyzer {
            name: format!("pipeline_{}", tokenizer.name()),
            tokenizer,
            filters: Vec::new(),
        }
    }

    /// Add a filter to the pipeline.
    pub fn add_filter(mut self, filter: Arc<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set a custom name for this analyzer.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Get the tokenizer used by this analyzer.
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Get the filters used by this analyzer.
    pub fn filters(&self) -> &[Arc<dyn TokenFilter>] {
        &self.filters
    }
}

impl Analyzer for PipelineAnalyzer {
    fn analyze<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        let source = self.tokenizer.tokenize(text)?;
        if self.filters.is_empty() {
            return Ok(source);
        }
        Ok(Box::new(PipelineStream {
            source,
            filters: self.filters.clone(),
            pending: VecDeque::new(),
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn has_surface_channel(&self) -> bool {
        self.filters.iter().any(|f| f.emits_surface())
    }
}

/// Pulls one tokenizer token at a time through the stages.
///
/// `pending` holds tokens together with the index of the next stage they
/// have to pass. Tokens are processed depth first, so output order follows
/// input order and at most `2^stages` tokens wait at any time.
struct PipelineStream<'a> {
    source: TokenStream<'a>,
    filters: Vec<Arc<dyn TokenFilter>>,
    pending: VecDeque<(usize, Token)>,
}

impl Iterator for PipelineStream<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let Some((stage, token)) = self.pending.pop_front() else {
                let token = self.source.next()?;
                self.pending.push_back((0, token));
                continue;
            };

            let Some(filter) = self.filters.get(stage) else {
                return Some(token);
            };

            let placeholder = token.emptied();
            match filter.consume(token) {
                Ok(Emit::Drop) => {}
                Ok(Emit::One(token)) => self.pending.push_front((stage + 1, token)),
                Ok(Emit::Two(first, second)) => {
                    self.pending.push_front((stage + 1, second));
                    self.pending.push_front((stage + 1, first));
                }
                Err(e) => {
                    warn!(
                        "Filter '{}' failed at position {}: {e}; substituting an empty token",
                        filter.name(),
                        placeholder.position
                    );
                    return Some(placeholder);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::language::Language;
    use crate::analysis::token::Channel;
    use crate::analysis::token_filter::lowercase::LowercaseFilter;
    use crate::analysis::token_filter::stem::StemPrefixFilter;
    use crate::analysis::tokenizer::whitespace::WhitespaceTokenizer;
    use crate::error::GlaiveError;

    struct Duplicate;

    impl TokenFilter for Duplicate {
        fn consume(&self, token: Token) -> Result<Emit> {
            Ok(Emit::Two(token.clone(), token.with_text("dup")))
        }

        fn name(&self) -> &'static str {
            "duplicate"
        }
    }

    struct FailOn(&'static str);

    impl TokenFilter for FailOn {
        fn consume(&self, token: Token) -> Result<Emit> {
            if token.text == self.0 {
                Err(GlaiveError::analysis("boom"))
            } else {
                Ok(Emit::One(token))
            }
        }

        fn name(&self) -> &'static str {
            "fail_on"
        }
    }

    fn texts(analyzer: &PipelineAnalyzer, text: &str) -> Vec<String> {
        analyzer.analyze(text).unwrap().map(|t| t.text).collect()
    }

    #[test]
    fn test_two_token_stages_compose_in_order() {
        let analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_filter(Arc::new(Duplicate))
            .add_filter(Arc::new(Duplicate));

        assert_eq!(texts(&analyzer, "a"), vec!["a", "dup", "dup", "dup"]);
        assert_eq!(analyzer.analyze("a b").unwrap().count(), 8);
    }

    #[test]
    fn test_stage_failure_yields_empty_token() {
        let analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_filter(Arc::new(FailOn("bad")))
            .add_filter(Arc::new(LowercaseFilter::new()));

        let tokens: Vec<Token> = analyzer.analyze("One bad Two").unwrap().collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].text, "one");
        assert!(tokens[1].is_empty());
        assert_eq!(tokens[1].position, 1);
        assert_eq!(tokens[2].text, "two");
    }

    #[test]
    fn test_restartable() {
        let analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_filter(Arc::new(LowercaseFilter::new()));

        let first = texts(&analyzer, "Same Text");
        let second = texts(&analyzer, "Same Text");
        assert_eq!(first, second);
    }

    #[test]
    fn test_surface_channel_detection() {
        let plain = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()));
        assert!(!plain.has_surface_channel());

        let prefixed = plain.add_filter(Arc::new(StemPrefixFilter::new(Language::English)));
        assert!(prefixed.has_surface_channel());

        let tokens: Vec<Token> = prefixed.analyze("jumping").unwrap().collect();
        assert_eq!(tokens[0].channel, Channel::Main);
        assert_eq!(tokens[1].channel, Channel::Surface);
    }

    #[test]
    fn test_malformed_bytes_recover() {
        let analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_filter(Arc::new(StemPrefixFilter::new(Language::English)));

        let tokens = analyzer.analyze_bytes(b"good \xFF\xFE bytes").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["good", "good", "", "byte", "bytes"]);
    }
}
