//! Boolean query implementation for combining multiple queries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::matcher::{
    AllMatcher, BoostMatcher, ConjunctionMatcher, DisjunctionMatcher, EmptyMatcher,
    ExclusionMatcher, Matcher, RequiredOptionalMatcher,
};
use crate::query::query::{Query, QueryContext, write_boost};
use crate::query::term::one;
use crate::segment::reader::SegmentReader;

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
}

/// A clause in a boolean query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanClause {
    /// The occurrence requirement.
    pub occur: Occur,
    /// The query for this clause.
    pub query: Query,
}

impl BooleanClause {
    /// Create a new boolean clause.
    pub fn new(occur: Occur, query: Query) -> Self {
        BooleanClause { occur, query }
    }
}

/// A boolean query that combines multiple queries with boolean logic.
///
/// With at least one `Must` clause the `Should` clauses only add to the
/// score. Without any, at least one `Should` clause has to match. A query
/// made only of `MustNot` clauses matches every live document not excluded,
/// and an empty query matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanQuery {
    /// The clauses in insertion order.
    pub clauses: Vec<BooleanClause>,
    /// Boost applied to the combined score.
    #[serde(default = "one")]
    pub boost: f32,
}

impl BooleanQuery {
    /// Create an empty boolean query.
    pub fn new() -> Self {
        BooleanQuery {
            clauses: Vec::new(),
            boost: 1.0,
        }
    }

    /// Start building a boolean query.
    pub fn builder() -> BooleanQueryBuilder {
        BooleanQueryBuilder::new()
    }

    /// Add a clause.
    pub fn add(&mut self, occur: Occur, query: Query) {
        self.clauses.push(BooleanClause::new(occur, query));
    }

    /// Whether the query has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Clauses with the given occurrence.
    pub fn clauses_by_occur(&self, occur: Occur) -> impl Iterator<Item = &Query> {
        self.clauses
            .iter()
            .filter(move |clause| clause.occur == occur)
            .map(|clause| &clause.query)
    }

    pub(crate) fn matcher(
        &self,
        context: &QueryContext<'_>,
        segment: &SegmentReader,
    ) -> Result<Box<dyn Matcher>> {
        if self.clauses.is_empty() {
            return Ok(Box::new(EmptyMatcher::new()));
        }

        let mut required = Vec::new();
        for query in self.clauses_by_occur(Occur::Must) {
            let matcher = query.matcher(context, segment)?;
            if matcher.is_exhausted() {
                return Ok(Box::new(EmptyMatcher::new()));
            }
            required.push(matcher);
        }
        let optional = live_matchers(self.clauses_by_occur(Occur::Should), context, segment)?;
        let excluded = live_matchers(self.clauses_by_occur(Occur::MustNot), context, segment)?;

        let has_positive = self
            .clauses
            .iter()
            .any(|clause| clause.occur != Occur::MustNot);

        let positive: Box<dyn Matcher> = match (required.len(), optional.is_empty()) {
            (0, true) if has_positive => return Ok(Box::new(EmptyMatcher::new())),
            (0, true) => Box::new(AllMatcher::new(segment, 1.0)),
            (0, false) => disjunction(optional),
            (_, true) => conjunction(required)?,
            (_, false) => Box::new(RequiredOptionalMatcher::new(
                conjunction(required)?,
                disjunction(optional),
            )?),
        };

        let matcher = if excluded.is_empty() {
            positive
        } else {
            Box::new(ExclusionMatcher::new(positive, disjunction(excluded))?)
        };
        Ok(BoostMatcher::wrap(matcher, self.boost))
    }
}

impl Default for BooleanQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Build matchers for the queries, dropping those that match nothing here.
fn live_matchers<'q>(
    queries: impl Iterator<Item = &'q Query>,
    context: &QueryContext<'_>,
    segment: &SegmentReader,
) -> Result<Vec<Box<dyn Matcher>>> {
    let mut matchers = Vec::new();
    for query in queries {
        let matcher = query.matcher(context, segment)?;
        if !matcher.is_exhausted() {
            matchers.push(matcher);
        }
    }
    Ok(matchers)
}

fn conjunction(mut matchers: Vec<Box<dyn Matcher>>) -> Result<Box<dyn Matcher>> {
    if matchers.len() == 1 {
        if let Some(matcher) = matchers.pop() {
            return Ok(matcher);
        }
    }
    Ok(Box::new(ConjunctionMatcher::new(matchers)?))
}

fn disjunction(mut matchers: Vec<Box<dyn Matcher>>) -> Box<dyn Matcher> {
    if matchers.len() == 1 {
        if let Some(matcher) = matchers.pop() {
            return matcher;
        }
    }
    Box::new(DisjunctionMatcher::new(matchers))
}

impl fmt::Display for BooleanQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nested = self.boost != 1.0;
        if nested {
            f.write_str("(")?;
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match clause.occur {
                Occur::Must => f.write_str("+")?,
                Occur::MustNot => f.write_str("-")?,
                Occur::Should => {}
            }
            match &clause.query {
                Query::Boolean(inner) if inner.boost == 1.0 => write!(f, "({inner})")?,
                other => write!(f, "{other}")?,
            }
        }
        if nested {
            f.write_str(")")?;
        }
        write_boost(f, self.boost)
    }
}

/// Builder for [`BooleanQuery`].
#[derive(Debug, Default)]
pub struct BooleanQueryBuilder {
    query: BooleanQuery,
}

impl BooleanQueryBuilder {
    /// Create a builder for an empty query.
    pub fn new() -> Self {
        BooleanQueryBuilder {
            query: BooleanQuery::new(),
        }
    }

    /// Add a clause that must match.
    pub fn must<Q: Into<Query>>(mut self, query: Q) -> Self {
        self.query.add(Occur::Must, query.into());
        self
    }

    /// Add a clause that should match.
    pub fn should<Q: Into<Query>>(mut self, query: Q) -> Self {
        self.query.add(Occur::Should, query.into());
        self
    }

    /// Add a clause that must not match.
    pub fn must_not<Q: Into<Query>>(mut self, query: Q) -> Self {
        self.query.add(Occur::MustNot, query.into());
        self
    }

    /// Add a clause with an explicit occurrence.
    pub fn clause<Q: Into<Query>>(mut self, occur: Occur, query: Q) -> Self {
        self.query.add(occur, query.into());
        self
    }

    /// Set the boost.
    pub fn boost(mut self, boost: f32) -> Self {
        self.query.boost = boost;
        self
    }

    /// Finish the query.
    pub fn build(self) -> BooleanQuery {
        self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::collect_doc_ids;
    use crate::query::query::{DEFAULT_MAX_CLAUSE_COUNT, testing};
    use crate::segment::DocId;
    use crate::storage::memory::MemoryStorage;

    const BODIES: [&str; 5] = [
        "quick brown fox",
        "lazy brown dog",
        "quick red fox",
        "slow red cat",
        "quick cat",
    ];

    fn matches(query: BooleanQuery) -> Vec<DocId> {
        let storage = MemoryStorage::new();
        let segment = testing::segment(&storage, "segment_000001", &BODIES);
        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);
        let mut matcher = query.matcher(&context, &segment).unwrap();
        collect_doc_ids(matcher.as_mut()).unwrap()
    }

    #[test]
    fn test_must_and_must_not() {
        let query = BooleanQuery::builder()
            .must(Query::term("body", "quick"))
            .must_not(Query::term("body", "fox"))
            .build();
        assert_eq!(matches(query), vec![4]);

        let query = BooleanQuery::builder()
            .must(Query::term("body", "quick"))
            .must(Query::term("body", "zebra"))
            .build();
        assert!(matches(query).is_empty());
    }

    #[test]
    fn test_should_only_is_disjunction() {
        let query = BooleanQuery::builder()
            .should(Query::term("body", "dog"))
            .should(Query::term("body", "cat"))
            .should(Query::term("body", "zebra"))
            .build();
        assert_eq!(matches(query), vec![1, 3, 4]);

        let query = BooleanQuery::builder()
            .should(Query::term("body", "zebra"))
            .must_not(Query::term("body", "fox"))
            .build();
        assert!(matches(query).is_empty());
    }

    #[test]
    fn test_should_clauses_raise_score() {
        let storage = MemoryStorage::new();
        let segment = testing::segment(&storage, "segment_000001", &BODIES);
        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);
        let query = BooleanQuery::builder()
            .must(Query::term("body", "fox"))
            .should(Query::term("body", "red"))
            .build();
        let mut matcher = query.matcher(&context, &segment).unwrap();
        assert_eq!(matcher.doc_id(), 0);
        let without = matcher.score();
        assert!(matcher.next().unwrap());
        assert_eq!(matcher.doc_id(), 2);
        assert!(matcher.score() > without);
    }

    #[test]
    fn test_pure_negation_and_empty() {
        let query = BooleanQuery::builder()
            .must_not(Query::term("body", "quick"))
            .build();
        assert_eq!(matches(query), vec![1, 3]);
        assert!(matches(BooleanQuery::new()).is_empty());
    }

    #[test]
    fn test_display_nesting() {
        let inner = BooleanQuery::builder()
            .should(Query::term("body", "a"))
            .should(Query::term("body", "b"))
            .build();
        let query = BooleanQuery::builder()
            .must(Query::term("body", "c"))
            .must(inner)
            .boost(2.0)
            .build();
        assert_eq!(query.to_string(), "(+body:c +(body:a body:b))^2");
    }
}
