//! The query tree.
//!
//! A [`Query`] is a plain value: it can be built by hand, parsed from a
//! string with [`QueryParser`](crate::query::parser::QueryParser), cloned
//! and reused against any snapshot. Execution turns it into one
//! [`Matcher`] per segment.

use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::document::field_value::FieldValue;
use crate::error::{GlaiveError, Result};
use crate::query::boolean::{BooleanQuery, BooleanQueryBuilder};
use crate::query::matcher::{AllMatcher, Matcher};
use crate::query::phrase::PhraseQuery;
use crate::query::prefix::PrefixQuery;
use crate::query::range::RangeQuery;
use crate::query::scorer::{TfIdfScorer, idf};
use crate::query::term::TermQuery;
use crate::segment::reader::SegmentReader;
use crate::segment::term::{TermKey, validate_field_name};

/// Default limit on the number of terms a prefix or range query may expand to.
pub const DEFAULT_MAX_CLAUSE_COUNT: usize = 1024;

/// Snapshot-wide information needed to build matchers.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    segments: &'a [SegmentReader],
    total_docs: u64,
    max_clause_count: usize,
}

impl<'a> QueryContext<'a> {
    /// Create a context over the segments of a snapshot.
    pub fn new(segments: &'a [SegmentReader], max_clause_count: usize) -> Self {
        QueryContext {
            segments,
            total_docs: segments.iter().map(|s| s.max_doc() as u64).sum(),
            max_clause_count,
        }
    }

    /// Documents in the snapshot, deleted ones included.
    pub fn total_docs(&self) -> u64 {
        self.total_docs
    }

    /// Number of documents containing `term` across the snapshot.
    pub fn doc_freq(&self, term: &TermKey) -> u64 {
        self.segments.iter().map(|s| s.doc_freq(term) as u64).sum()
    }

    /// Snapshot-wide idf of `term`.
    pub fn idf(&self, term: &TermKey) -> f32 {
        idf(self.total_docs, self.doc_freq(term))
    }

    /// TF-IDF scorer of `term`.
    pub fn term_scorer(&self, term: &TermKey, boost: f32) -> TfIdfScorer {
        TfIdfScorer::new(self.total_docs, self.doc_freq(term), boost)
    }

    /// Maximum number of terms one multi-term query may expand to.
    pub fn max_clause_count(&self) -> usize {
        self.max_clause_count
    }
}

/// Query matching every live document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAllQuery {
    /// Score given to every document.
    pub boost: f32,
}

impl Default for MatchAllQuery {
    fn default() -> Self {
        MatchAllQuery { boost: 1.0 }
    }
}

/// A node of the query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// A single term.
    Term(TermQuery),
    /// Terms at consecutive positions.
    Phrase(PhraseQuery),
    /// Terms starting with a prefix.
    Prefix(PrefixQuery),
    /// Terms within bounds.
    Range(RangeQuery),
    /// Combination of sub-queries.
    Boolean(BooleanQuery),
    /// Every document.
    MatchAll(MatchAllQuery),
}

impl Query {
    /// Query for a main channel term.
    pub fn term<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        Query::Term(TermQuery::new(field, text))
    }

    /// Query for consecutive words.
    pub fn phrase<F, I, S>(field: F, words: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Phrase(PhraseQuery::new(field, words))
    }

    /// Query for words starting with `prefix`.
    pub fn prefix<F: Into<String>, P: Into<String>>(field: F, prefix: P) -> Self {
        Query::Prefix(PrefixQuery::new(field, prefix))
    }

    /// Query for values within bounds.
    pub fn range<F: Into<String>>(field: F, lower: Bound<FieldValue>, upper: Bound<FieldValue>) -> Self {
        Query::Range(RangeQuery::new(field, lower, upper))
    }

    /// Query matching everything.
    pub fn all() -> Self {
        Query::MatchAll(MatchAllQuery::default())
    }

    /// Start building a boolean query.
    pub fn boolean() -> BooleanQueryBuilder {
        BooleanQuery::builder()
    }

    /// Boost of this node.
    pub fn boost(&self) -> f32 {
        match self {
            Query::Term(q) => q.boost,
            Query::Phrase(q) => q.boost,
            Query::Prefix(q) => q.boost,
            Query::Range(q) => q.boost,
            Query::Boolean(q) => q.boost,
            Query::MatchAll(q) => q.boost,
        }
    }

    /// Set the boost of this node.
    pub fn with_boost(mut self, boost: f32) -> Self {
        match &mut self {
            Query::Term(q) => q.boost = boost,
            Query::Phrase(q) => q.boost = boost,
            Query::Prefix(q) => q.boost = boost,
            Query::Range(q) => q.boost = boost,
            Query::Boolean(q) => q.boost = boost,
            Query::MatchAll(q) => q.boost = boost,
        }
        self
    }

    /// Reject malformed trees before execution.
    pub fn validate(&self) -> Result<()> {
        let boost = self.boost();
        if !boost.is_finite() || boost < 0.0 {
            return Err(GlaiveError::query_syntax(format!(
                "boost must be a non-negative number, got {boost}"
            )));
        }
        match self {
            Query::Term(q) => {
                check_field(&q.field)?;
                if q.text.is_empty() {
                    return Err(GlaiveError::query_syntax(format!(
                        "empty term in field {}",
                        q.field
                    )));
                }
            }
            Query::Phrase(q) => {
                check_field(&q.field)?;
                if q.terms.is_empty() {
                    return Err(GlaiveError::query_syntax(format!(
                        "phrase in field {} has no terms",
                        q.field
                    )));
                }
                if q.terms.iter().any(|term| term.text.is_empty()) {
                    return Err(GlaiveError::query_syntax(format!(
                        "phrase in field {} contains an empty term",
                        q.field
                    )));
                }
            }
            Query::Prefix(q) => {
                check_field(&q.field)?;
                if q.prefix.is_empty() {
                    return Err(GlaiveError::query_syntax(format!(
                        "empty prefix in field {}",
                        q.field
                    )));
                }
            }
            Query::Range(q) => check_field(&q.field)?,
            Query::Boolean(q) => {
                for clause in &q.clauses {
                    clause.query.validate()?;
                }
            }
            Query::MatchAll(_) => {}
        }
        Ok(())
    }

    /// Build the matcher of this query for one segment.
    pub fn matcher(
        &self,
        context: &QueryContext<'_>,
        segment: &SegmentReader,
    ) -> Result<Box<dyn Matcher>> {
        match self {
            Query::Term(q) => q.matcher(context, segment),
            Query::Phrase(q) => q.matcher(context, segment),
            Query::Prefix(q) => q.matcher(context, segment),
            Query::Range(q) => q.matcher(context, segment),
            Query::Boolean(q) => q.matcher(context, segment),
            Query::MatchAll(q) => Ok(Box::new(AllMatcher::new(segment, q.boost))),
        }
    }
}

fn check_field(field: &str) -> Result<()> {
    validate_field_name(field).map_err(|e| GlaiveError::query_syntax(e.to_string()))
}

/// Append `^boost` when the boost is not 1.
pub(crate) fn write_boost(f: &mut fmt::Formatter<'_>, boost: f32) -> fmt::Result {
    if boost != 1.0 {
        write!(f, "^{boost}")?;
    }
    Ok(())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(q) => q.fmt(f),
            Query::Phrase(q) => q.fmt(f),
            Query::Prefix(q) => q.fmt(f),
            Query::Range(q) => q.fmt(f),
            Query::Boolean(q) => q.fmt(f),
            Query::MatchAll(q) => {
                f.write_str("*:*")?;
                write_boost(f, q.boost)
            }
        }
    }
}

impl From<TermQuery> for Query {
    fn from(query: TermQuery) -> Self {
        Query::Term(query)
    }
}

impl From<PhraseQuery> for Query {
    fn from(query: PhraseQuery) -> Self {
        Query::Phrase(query)
    }
}

impl From<PrefixQuery> for Query {
    fn from(query: PrefixQuery) -> Self {
        Query::Prefix(query)
    }
}

impl From<RangeQuery> for Query {
    fn from(query: RangeQuery) -> Self {
        Query::Range(query)
    }
}

impl From<BooleanQuery> for Query {
    fn from(query: BooleanQuery) -> Self {
        Query::Boolean(query)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::collect_doc_ids;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_validate() {
        assert!(Query::term("body", "fox").validate().is_ok());
        assert!(Query::term("", "fox").validate().is_err());
        assert!(Query::term("body", "").validate().is_err());
        assert!(Query::prefix("body", "").validate().is_err());
        assert!(Query::phrase("body", Vec::<String>::new()).validate().is_err());
        assert!(Query::all().with_boost(f32::NAN).validate().is_err());

        let nested = Query::boolean()
            .must(Query::term("body", "fox"))
            .should(Query::term("body", "").with_boost(2.0))
            .build();
        let err = Query::from(nested).validate().unwrap_err();
        assert!(matches!(err, GlaiveError::QuerySyntax(_)));
    }

    #[test]
    fn test_display() {
        let query: Query = Query::boolean()
            .must(Query::term("body", "quick"))
            .must_not(Query::prefix("body", "ca"))
            .should(Query::phrase("title", ["red", "fox"]).with_boost(2.0))
            .build()
            .into();
        assert_eq!(
            query.to_string(),
            "+body:quick -body:ca* title:\"red fox\"^2"
        );
    }

    #[test]
    fn test_match_all_skips_deleted() {
        let storage = MemoryStorage::new();
        let segment = testing::segment(&storage, "segment_000001", &["a", "b", "c"]);
        let mut bitmap = crate::segment::deletions::DeletionBitmap::new(3);
        bitmap.delete(0).unwrap();
        let segment = segment.with_deletions(1, std::sync::Arc::new(bitmap));

        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);
        let mut matcher = Query::all().matcher(&context, &segment).unwrap();
        assert_eq!(matcher.score(), 1.0);
        assert_eq!(collect_doc_ids(matcher.as_mut()).unwrap(), vec![1, 2]);
    }
}
