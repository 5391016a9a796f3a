//! # Glaive
//!
//! An embeddable full-text search library built on immutable segments.
//!
//! ## Features
//!
//! - Snowball stemming with unstemmed surface forms for prefix queries
//! - Append-only segments with deletion bitmaps and background merging
//! - Term, phrase, prefix, range and boolean queries with TF-IDF scoring
//! - A Lucene-style query parser
//! - Point-in-time readers isolated from concurrent commits
//! - Pluggable storage and write-lock backends
//!
//! ## Example
//!
//! ```
//! use glaive::prelude::*;
//!
//! let index = Index::open_in_memory(IndexConfig::default())?;
//! let mut writer = index.writer()?;
//! writer.add_document(Document::builder().add_text("t", "The quick fox").build())?;
//! writer.add_document(Document::builder().add_text("t", "A quick cat").build())?;
//! writer.commit()?;
//!
//! let query = index.query_parser().parse("quick -cat")?;
//! let results = index.searcher().search(&query, None, 10)?;
//! assert_eq!(results.total_hits(), 1);
//! # Ok::<(), glaive::error::GlaiveError>(())
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod lock;
pub mod query;
pub mod search;
pub mod segment;
pub mod storage;
pub mod util;

/// The types most programs need.
pub mod prelude {
    pub use crate::config::IndexConfig;
    pub use crate::document::{Document, FieldValue, Indexable, SearchFields, ValueType};
    pub use crate::error::{GlaiveError, Result};
    pub use crate::index::{Index, IndexReader, IndexWriter};
    pub use crate::query::{Query, QueryParser, SearchRequest, SortDescriptor};
    pub use crate::search::{SearchResult, SearchResults};
}

/// Version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
