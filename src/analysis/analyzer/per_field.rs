//! Field-to-analyzer routing.
//!
//! Writers and the query parser analyze every field through one
//! [`PerFieldAnalyzer`], so a word is always split the same way at index and
//! query time.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Routes each field to its analyzer, falling back to a default.
///
/// ```
/// use std::sync::Arc;
///
/// use glaive::analysis::analyzer::keyword::KeywordAnalyzer;
/// use glaive::analysis::analyzer::language::Language;
/// use glaive::analysis::analyzer::per_field::PerFieldAnalyzer;
/// use glaive::analysis::analyzer::snowball::SnowballAnalyzer;
///
/// let mut analyzer = PerFieldAnalyzer::new(Arc::new(SnowballAnalyzer::new(Language::English)));
/// analyzer.add_analyzer("id", Arc::new(KeywordAnalyzer::new()));
///
/// assert!(analyzer.field_has_surface_channel("body"));
/// assert!(!analyzer.field_has_surface_channel("id"));
/// let id: Vec<String> = analyzer.analyze_field("id", "Doc-42").unwrap().map(|t| t.text).collect();
/// assert_eq!(id, vec!["Doc-42"]);
/// ```
#[derive(Clone)]
pub struct PerFieldAnalyzer {
    fallback: Arc<dyn Analyzer>,
    overrides: AHashMap<String, Arc<dyn Analyzer>>,
}

impl PerFieldAnalyzer {
    pub fn new(fallback: Arc<dyn Analyzer>) -> Self {
        PerFieldAnalyzer {
            fallback,
            overrides: AHashMap::new(),
        }
    }

    /// Route `field` to `analyzer`, replacing any earlier choice.
    pub fn add_analyzer(&mut self, field: impl Into<String>, analyzer: Arc<dyn Analyzer>) {
        self.overrides.insert(field.into(), analyzer);
    }

    pub fn get_analyzer(&self, field: &str) -> &Arc<dyn Analyzer> {
        self.overrides.get(field).unwrap_or(&self.fallback)
    }

    pub fn default_analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.fallback
    }

    /// Fields with their own analyzer, in no particular order.
    pub fn overridden_fields(&self) -> impl Iterator<Item = &str> {
        self.overrides.keys().map(String::as_str)
    }

    /// Analyze `text` as a value of `field`.
    pub fn analyze_field<'a>(&self, field: &str, text: &'a str) -> Result<TokenStream<'a>> {
        self.get_analyzer(field).analyze(text)
    }

    /// Whether values of `field` also carry unstemmed surface tokens.
    pub fn field_has_surface_channel(&self, field: &str) -> bool {
        self.get_analyzer(field).has_surface_channel()
    }
}

impl fmt::Debug for PerFieldAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<(&str, &str)> = self
            .overrides
            .iter()
            .map(|(field, analyzer)| (field.as_str(), analyzer.name()))
            .collect();
        fields.sort_unstable();
        f.debug_struct("PerFieldAnalyzer")
            .field("default", &self.fallback.name())
            .field("fields", &fields)
            .finish()
    }
}

/// Used on its own, the analyzer behaves like its default.
impl Analyzer for PerFieldAnalyzer {
    fn analyze<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        self.fallback.analyze(text)
    }

    fn name(&self) -> &str {
        "per_field"
    }

    fn has_surface_channel(&self) -> bool {
        self.fallback.has_surface_channel()
    }
}
