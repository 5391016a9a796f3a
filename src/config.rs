//! Index configuration.
//!
//! [`IndexConfig`] gathers every tunable of an index: text analysis, the
//! writer's buffering and merging, reader behavior, query parsing and
//! locking. It deserializes from JSON with every section optional:
//!
//! ```
//! use glaive::config::IndexConfig;
//!
//! let config = IndexConfig::from_json(r#"{
//!     "analysis": { "language": "fr", "fields": { "code": { "type": "keyword" } } },
//!     "writer": { "max_buffered_docs": 500 }
//! }"#).unwrap();
//! assert_eq!(config.writer.max_buffered_docs, 500);
//! assert!(config.validate().is_ok());
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::analyzer::keyword::KeywordAnalyzer;
use crate::analysis::analyzer::language::Language;
use crate::analysis::analyzer::per_field::PerFieldAnalyzer;
use crate::analysis::analyzer::snowball::SnowballAnalyzer;
use crate::analysis::analyzer::standard::StandardAnalyzer;
use crate::document::search_fields::SearchFields;
use crate::error::{GlaiveError, Result};
use crate::index::merge_policy::{LogMergePolicy, MergePolicy, NoMergePolicy};
use crate::lock::{FsLockFactory, LockFactory, NoLockFactory, SingleInstanceLockFactory};
use crate::query::parser::Operator;
use crate::query::query::DEFAULT_MAX_CLAUSE_COUNT;

/// Complete configuration of an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Text analysis.
    pub analysis: AnalysisConfig,
    /// Index writer behavior.
    pub writer: WriterConfig,
    /// Segment reading.
    pub reader: ReaderConfig,
    /// Query parsing and execution.
    pub query: QueryConfig,
    /// Write locking.
    pub lock: LockConfig,
}

impl IndexConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            GlaiveError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(text)?;
        Ok(config)
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        self.analysis.language()?;
        for (field, analyzer) in &self.analysis.fields {
            if let FieldAnalyzer::Snowball { language, .. } = analyzer {
                Language::from_tag(language).map_err(|e| {
                    GlaiveError::config(format!("Field {field}: {e}"))
                })?;
            }
        }
        if self.writer.max_buffered_docs == 0 {
            return Err(GlaiveError::config("max_buffered_docs must be at least 1"));
        }
        if let MergePolicyConfig::Log(policy) = &self.writer.merge_policy {
            if policy.merge_factor < 2 {
                return Err(GlaiveError::config("merge_factor must be at least 2"));
            }
            if !(0.0..=1.0).contains(&policy.max_deleted_ratio) {
                return Err(GlaiveError::config("max_deleted_ratio must be between 0 and 1"));
            }
        }
        if self.query.max_clause_count == 0 {
            return Err(GlaiveError::config("max_clause_count must be at least 1"));
        }
        Ok(())
    }
}

/// How text is analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Language tag of the default analyzer, e.g. `en` or `german`.
    pub language: String,
    /// Stop words replacing the language's defaults; empty disables them.
    pub stop_words: Option<Vec<String>>,
    /// Index unstemmed surface forms for prefix queries.
    pub prefix_support: bool,
    /// Analyzers for specific fields.
    pub fields: BTreeMap<String, FieldAnalyzer>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(SearchFields::IDENTIFIER.to_string(), FieldAnalyzer::Keyword);
        fields.insert(SearchFields::OBJECT_TYPE.to_string(), FieldAnalyzer::Keyword);
        AnalysisConfig {
            language: "en".to_string(),
            stop_words: None,
            prefix_support: true,
            fields,
        }
    }
}

impl AnalysisConfig {
    /// The default analyzer's language.
    pub fn language(&self) -> Result<Language> {
        Language::from_tag(&self.language).map_err(|e| GlaiveError::config(e.to_string()))
    }

    /// Build the per-field analyzer described by this configuration.
    pub fn build_analyzer(&self) -> Result<Arc<PerFieldAnalyzer>> {
        let default = self.snowball(self.language()?, self.prefix_support);
        let mut analyzer = PerFieldAnalyzer::new(default);
        for (field, kind) in &self.fields {
            let field_analyzer: Arc<dyn Analyzer> = match kind {
                FieldAnalyzer::Keyword => Arc::new(KeywordAnalyzer::new()),
                FieldAnalyzer::Standard => Arc::new(StandardAnalyzer::new()),
                FieldAnalyzer::Snowball {
                    language,
                    prefix_support,
                } => {
                    let language = Language::from_tag(language)
                        .map_err(|e| GlaiveError::config(e.to_string()))?;
                    self.snowball(language, prefix_support.unwrap_or(self.prefix_support))
                }
            };
            analyzer.add_analyzer(field.clone(), field_analyzer);
        }
        Ok(Arc::new(analyzer))
    }

    fn snowball(&self, language: Language, prefix_support: bool) -> Arc<dyn Analyzer> {
        let mut builder = SnowballAnalyzer::builder(language).prefix_support(prefix_support);
        if let Some(words) = &self.stop_words {
            builder = builder.stop_words(words.iter().cloned());
        }
        Arc::new(builder.build())
    }
}

/// Analyzer choice for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldAnalyzer {
    /// Index the whole value as one term.
    Keyword,
    /// Lowercased words without stemming.
    Standard,
    /// Stemmed words in a specific language.
    Snowball {
        /// Language tag.
        language: String,
        /// Overrides the global prefix support.
        #[serde(default)]
        prefix_support: Option<bool>,
    },
}

/// Which merge policy the writer consults at commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergePolicyConfig {
    /// Only explicit merges.
    None,
    /// Logarithmic size tiers.
    Log(LogMergePolicy),
}

impl Default for MergePolicyConfig {
    fn default() -> Self {
        MergePolicyConfig::Log(LogMergePolicy::default())
    }
}

impl MergePolicyConfig {
    /// Instantiate the policy.
    pub fn build(&self) -> Box<dyn MergePolicy> {
        match self {
            MergePolicyConfig::None => Box::new(NoMergePolicy),
            MergePolicyConfig::Log(policy) => Box::new(policy.clone()),
        }
    }
}

/// Where merges run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSchedulerKind {
    /// Inside `commit` on the caller's thread.
    #[default]
    Serial,
    /// On a worker thread per merge, installed at a later commit.
    Background,
}

/// Index writer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Buffered documents that trigger an automatic flush.
    pub max_buffered_docs: usize,
    /// Merge policy.
    pub merge_policy: MergePolicyConfig,
    /// Merge scheduler.
    pub merge_scheduler: MergeSchedulerKind,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            max_buffered_docs: 10_000,
            merge_policy: MergePolicyConfig::default(),
            merge_scheduler: MergeSchedulerKind::default(),
        }
    }
}

/// Segment reading settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Memory-map segment files instead of reading them.
    pub use_mmap: bool,
    /// Skip segments that fail validation instead of refusing to open.
    pub tolerate_corrupt_segments: bool,
}

/// Query settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Fields searched by unqualified words.
    pub default_fields: Vec<String>,
    /// Operator between clauses without one.
    pub default_operator: Operator,
    /// Limit on the terms a prefix or range query may expand to.
    pub max_clause_count: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            default_fields: SearchFields::default_search_fields()
                .iter()
                .map(|f| f.to_string())
                .collect(),
            default_operator: Operator::And,
            max_clause_count: DEFAULT_MAX_CLAUSE_COUNT,
        }
    }
}

/// Lock factory choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// OS advisory lock on `write.lock`.
    Fs,
    /// Exclusivity within this process only.
    SingleInstance,
    /// No locking; the caller guarantees a single writer.
    None,
}

/// Locking settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lock factory; on-disk indexes default to `fs`, in-memory ones to
    /// `single_instance`.
    pub kind: Option<LockKind>,
    /// How long to wait for a held lock, 0 to fail at once.
    pub lock_timeout_ms: u64,
}

impl LockConfig {
    /// Build the lock factory.
    pub fn build(&self, in_memory: bool) -> Arc<dyn LockFactory> {
        let kind = self.kind.unwrap_or(if in_memory {
            LockKind::SingleInstance
        } else {
            LockKind::Fs
        });
        match kind {
            LockKind::Fs if self.lock_timeout_ms > 0 => Arc::new(FsLockFactory::with_timeout(
                Duration::from_millis(self.lock_timeout_ms),
            )),
            LockKind::Fs => Arc::new(FsLockFactory::new()),
            LockKind::SingleInstance => Arc::new(SingleInstanceLockFactory::new()),
            LockKind::None => Arc::new(NoLockFactory),
        }
    }
}
