//! Query system for searching documents.
//!
//! Queries are plain data ([`Query`]) built with constructors or parsed from
//! strings by [`QueryParser`]. A [`Searcher`] turns a query into one
//! [`Matcher`](matcher::Matcher) tree per segment, scores the matches with
//! TF-IDF and collects the best hits.
//!
//! ```
//! use glaive::query::Query;
//!
//! let query: Query = Query::boolean()
//!     .must(Query::term("body", "quick"))
//!     .must_not(Query::prefix("body", "ca"))
//!     .build()
//!     .into();
//! assert_eq!(query.to_string(), "+body:quick -body:ca*");
//! ```

pub mod boolean;
pub mod collector;
pub mod matcher;
pub mod parser;
pub mod phrase;
pub mod prefix;
#[allow(clippy::module_inception)]
pub mod query;
pub mod range;
pub mod scorer;
pub mod searcher;
pub mod sort;
pub mod term;

pub use self::boolean::{BooleanClause, BooleanQuery, BooleanQueryBuilder, Occur};
pub use self::collector::{Collector, CountCollector, ScoredHit, TopHitsCollector};
pub use self::parser::{Operator, QueryParser};
pub use self::phrase::{PhraseQuery, PhraseTerm};
pub use self::prefix::PrefixQuery;
pub use self::query::{DEFAULT_MAX_CLAUSE_COUNT, MatchAllQuery, Query, QueryContext};
pub use self::range::RangeQuery;
pub use self::scorer::{ConstantScorer, Scorer, TfIdfScorer};
pub use self::searcher::{SearchRequest, Searcher};
pub use self::sort::{SortDescriptor, SortDirection, SortType, SortValue};
pub use self::term::TermQuery;
