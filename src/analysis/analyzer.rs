//! Analyzers combine a tokenizer with filter stages.
//!
//! - [`StandardAnalyzer`] - Unicode words, lowercase, English stop words
//! - [`SnowballAnalyzer`] - Standard plus Snowball stemming, optionally
//!   keeping unstemmed words for prefix queries
//! - [`KeywordAnalyzer`] - Treats the entire input as one token
//! - [`PipelineAnalyzer`] - Custom tokenizer + filter chains
//! - [`PerFieldAnalyzer`] - Different analyzers per field

#[allow(clippy::module_inception)]
pub mod analyzer;
pub mod keyword;
pub mod language;
pub mod per_field;
pub mod pipeline;
pub mod snowball;
pub mod standard;

pub use analyzer::Analyzer;
pub use keyword::KeywordAnalyzer;
pub use language::Language;
pub use per_field::PerFieldAnalyzer;
pub use pipeline::PipelineAnalyzer;
pub use snowball::{SnowballAnalyzer, SnowballAnalyzerBuilder};
pub use standard::StandardAnalyzer;
