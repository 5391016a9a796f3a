//! Snowball analyzer: Unicode words, lowercased, stop words removed, stemmed.
//!
//! With prefix support enabled the stemming stage is a
//! [`StemPrefixFilter`], so each word is indexed twice at one position: its
//! stem on the main channel and the word itself on the surface channel.
//!
//! ```
//! use glaive::analysis::analyzer::analyzer::Analyzer;
//! use glaive::analysis::analyzer::language::Language;
//! use glaive::analysis::analyzer::snowball::SnowballAnalyzer;
//!
//! let analyzer = SnowballAnalyzer::new(Language::English);
//! let texts: Vec<String> = analyzer
//!     .analyze("Running foxes")
//!     .unwrap()
//!     .map(|t| t.text)
//!     .collect();
//! assert_eq!(texts, vec!["run", "running", "fox", "foxes"]);
//! ```

use std::sync::Arc;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::analyzer::language::Language;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::lowercase::LowercaseFilter;
use crate::analysis::token_filter::stem::{StemFilter, StemPrefixFilter};
use crate::analysis::token_filter::stop::StopFilter;
use crate::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
use crate::error::Result;

/// Language-aware analyzer built on the Snowball stemmers.
pub struct SnowballAnalyzer {
    language: Language,
    prefix_support: bool,
    inner: PipelineAnalyzer,
}

impl SnowballAnalyzer {
    /// Analyzer with the language's default stop words and prefix support.
    pub fn new(language: Language) -> Self {
        Self::builder(language).build()
    }

    /// Start configuring an analyzer.
    pub fn builder(language: Language) -> SnowballAnalyzerBuilder {
        SnowballAnalyzerBuilder {
            language,
            stop_words: None,
            prefix_support: true,
        }
    }

    /// The stemming language.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Whether unstemmed words are kept on the surface channel.
    pub fn prefix_support(&self) -> bool {
        self.prefix_support
    }
}

impl Analyzer for SnowballAnalyzer {
    fn analyze<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn has_surface_channel(&self) -> bool {
        self.prefix_support
    }
}

/// Builder for [`SnowballAnalyzer`].
#[derive(Debug, Clone)]
pub struct SnowballAnalyzerBuilder {
    language: Language,
    stop_words: Option<Vec<String>>,
    prefix_support: bool,
}

impl SnowballAnalyzerBuilder {
    /// Replace the default stop words.
    pub fn stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = Some(words.into_iter().map(Into::into).collect());
        self
    }

    /// Keep or drop the unstemmed surface tokens.
    pub fn prefix_support(mut self, enabled: bool) -> Self {
        self.prefix_support = enabled;
        self
    }

    /// Build the analyzer.
    pub fn build(self) -> SnowballAnalyzer {
        let stop_filter = match self.stop_words {
            Some(words) => StopFilter::from_words(words),
            None => StopFilter::from_words(self.language.default_stop_words().iter().copied()),
        };

        let mut pipeline = PipelineAnalyzer::new(Arc::new(UnicodeWordTokenizer::new()))
            .add_filter(Arc::new(LowercaseFilter::new()));
        if !stop_filter.is_empty() {
            pipeline = pipeline.add_filter(Arc::new(stop_filter));
        }
        pipeline = if self.prefix_support {
            pipeline.add_filter(Arc::new(StemPrefixFilter::new(self.language)))
        } else {
            pipeline.add_filter(Arc::new(StemFilter::new(self.language)))
        };

        SnowballAnalyzer {
            language: self.language,
            prefix_support: self.prefix_support,
            inner: pipeline.with_name(format!("snowball_{}", self.language.code())),
        }
    }
}
