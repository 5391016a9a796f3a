//! Prefix query implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::token::Channel;
use crate::error::{GlaiveError, Result};
use crate::query::matcher::{ConstantScoreMatcher, DisjunctionMatcher, EmptyMatcher, Matcher, TermMatcher};
use crate::query::query::{QueryContext, write_boost};
use crate::query::scorer::ConstantScorer;
use crate::query::term::one;
use crate::segment::reader::SegmentReader;

/// A query that matches documents containing a term starting with a prefix.
///
/// Fields indexed with unstemmed surface tokens are expanded on the surface
/// channel, so `run*` finds "running" even though the main channel holds
/// "run". A field that also took keyword or other verbatim values is
/// expanded on both channels. Every match scores the boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    /// Field to search.
    pub field: String,
    /// Required prefix.
    pub prefix: String,
    /// Boost factor.
    #[serde(default = "one")]
    pub boost: f32,
}

impl PrefixQuery {
    /// Create a prefix query.
    pub fn new<F: Into<String>, P: Into<String>>(field: F, prefix: P) -> Self {
        PrefixQuery {
            field: field.into(),
            prefix: prefix.into(),
            boost: 1.0,
        }
    }

    /// Set the boost.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub(crate) fn matcher(
        &self,
        context: &QueryContext<'_>,
        segment: &SegmentReader,
    ) -> Result<Box<dyn Matcher>> {
        let Some(field_info) = segment.field_info(&self.field) else {
            return Ok(Box::new(EmptyMatcher::new()));
        };
        let mut channels = Vec::with_capacity(2);
        if field_info.has_surface {
            channels.push(Channel::Surface);
        }
        if field_info.verbatim || !field_info.has_surface {
            channels.push(Channel::Main);
        }

        let mut clauses: Vec<Box<dyn Matcher>> = Vec::new();
        let entries = channels
            .into_iter()
            .flat_map(|channel| segment.dictionary().prefix(&self.field, channel, &self.prefix));
        for entry in entries {
            let (_, info) = entry?;
            if clauses.len() == context.max_clause_count() {
                return Err(GlaiveError::query_syntax(format!(
                    "{self} expands to more than {} terms",
                    context.max_clause_count()
                )));
            }
            let postings = segment.postings_for(info)?;
            clauses.push(Box::new(TermMatcher::new(
                postings,
                segment,
                &self.field,
                Box::new(ConstantScorer::new(self.boost)),
            )?));
        }

        if clauses.is_empty() {
            return Ok(Box::new(EmptyMatcher::new()));
        }
        Ok(Box::new(ConstantScoreMatcher::new(
            Box::new(DisjunctionMatcher::new(clauses)),
            self.boost,
        )))
    }
}

impl fmt::Display for PrefixQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}*", self.field, self.prefix)?;
        write_boost(f, self.boost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::collect_doc_ids;
    use crate::document::document::Document;
    use crate::query::query::{DEFAULT_MAX_CLAUSE_COUNT, testing};
    use crate::segment::builder::SegmentBuilder;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_prefix_uses_surface_channel() {
        let storage = MemoryStorage::new();
        let segment = testing::segment(
            &storage,
            "segment_000001",
            &["running dogs", "the runner", "ran away", "rung"],
        );
        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);

        let mut matcher = PrefixQuery::new("body", "run")
            .with_boost(3.0)
            .matcher(&context, &segment)
            .unwrap();
        assert_eq!(matcher.score(), 3.0);
        assert_eq!(collect_doc_ids(matcher.as_mut()).unwrap(), vec![0, 1, 3]);

        // keyword fields have no surface channel
        let mut ids = PrefixQuery::new("id", "2").matcher(&context, &segment).unwrap();
        assert_eq!(collect_doc_ids(ids.as_mut()).unwrap(), vec![2]);

        let missing = PrefixQuery::new("title", "run").matcher(&context, &segment).unwrap();
        assert!(missing.is_exhausted());
    }

    #[test]
    fn test_prefix_spans_keyword_and_text_values() {
        let storage = MemoryStorage::new();
        let mut builder = SegmentBuilder::new(testing::analyzer());
        builder
            .add_document(&Document::builder().add_text("tag", "running").build())
            .unwrap();
        builder
            .add_document(&Document::builder().add_keyword("tag", "runway").build())
            .unwrap();
        builder.flush(&storage, "segment_000001").unwrap();
        let segment = SegmentReader::open(&storage, "segment_000001", None).unwrap();
        let info = segment.field_info("tag").unwrap();
        assert!(info.has_surface && info.verbatim);

        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);
        let mut keyword = PrefixQuery::new("tag", "runw").matcher(&context, &segment).unwrap();
        assert_eq!(collect_doc_ids(keyword.as_mut()).unwrap(), vec![1]);
        let mut both = PrefixQuery::new("tag", "run").matcher(&context, &segment).unwrap();
        assert_eq!(collect_doc_ids(both.as_mut()).unwrap(), vec![0, 1]);
        let mut text = PrefixQuery::new("tag", "runn").matcher(&context, &segment).unwrap();
        assert_eq!(collect_doc_ids(text.as_mut()).unwrap(), vec![0]);
    }

    #[test]
    fn test_expansion_limit() {
        let storage = MemoryStorage::new();
        let segment = testing::segment(&storage, "segment_000001", &["apple apricot avocado"]);
        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, 2);
        let err = PrefixQuery::new("body", "a").matcher(&context, &segment).unwrap_err();
        assert!(matches!(err, GlaiveError::QuerySyntax(_)));
    }
}
